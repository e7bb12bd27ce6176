//! 数独の写真から盤面を読み取るCLI
#![recursion_limit = "256"]

use anyhow::{Context, Result};
use burn::backend::Wgpu;
use burn::tensor::backend::AutodiffBackend;
use burn_autodiff::Autodiff;
use burn_ndarray::{NdArray, NdArrayDevice};
use burn_wgpu::WgpuDevice;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use sudoku_extractor_lib::analyzer::extract_sudoku;
use sudoku_extractor_lib::ml::{save_trained_model, train_model, DigitRecognizer, IMAGE_SIZE};
use sudoku_extractor_lib::model::{AppConfig, DeviceType};
use sudoku_extractor_lib::solver::{new_solver, solve_sudoku};
use sudoku_extractor_lib::SudokuGrid;

type GpuBackend = Autodiff<Wgpu>;
type CpuBackend = Autodiff<NdArray>;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// 設定ファイル（JSON）
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// MNISTで数字分類モデルを学習して保存する
    Train {
        /// 保存先（.tar.gz）
        #[clap(long)]
        output: Option<PathBuf>,
        #[clap(long)]
        epochs: Option<usize>,
        #[clap(long)]
        batch_size: Option<usize>,
        #[clap(long)]
        learning_rate: Option<f64>,
        /// wgpu | cpu
        #[clap(long)]
        device: Option<String>,
    },
    /// 学習済みモデルで写真から盤面を読み取る
    Extract {
        /// 学習済みモデル（.tar.gz）
        #[clap(long)]
        model: Option<PathBuf>,
        /// 数独の写真
        image: PathBuf,
        #[clap(long)]
        device: Option<String>,
        #[clap(flatten)]
        solve: SolveArgs,
    },
    /// モデルを学習してそのまま写真を読み取る（保存しない）
    Run {
        image: PathBuf,
        #[clap(long)]
        device: Option<String>,
        #[clap(flatten)]
        solve: SolveArgs,
    },
}

#[derive(clap::Args, Debug)]
struct SolveArgs {
    /// 読み取った盤面をSATソルバーで解く
    #[clap(long)]
    solve: bool,
    /// dpll | cdcl
    #[clap(long)]
    solver: Option<String>,
}

fn main() -> Result<()> {
    sudoku_extractor_lib::init_tracing();
    let args = Args::parse();

    let config_path = args.config.unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load_or_default(&config_path);

    match args.command {
        Command::Train {
            output,
            epochs,
            batch_size,
            learning_rate,
            device,
        } => {
            if let Some(epochs) = epochs {
                config.training.num_epochs = epochs;
            }
            if let Some(batch_size) = batch_size {
                config.training.batch_size = batch_size;
            }
            if let Some(learning_rate) = learning_rate {
                config.training.learning_rate = learning_rate;
            }
            apply_device(&mut config, device)?;
            let output = output.unwrap_or_else(|| PathBuf::from(&config.model.model_path));
            config.display();

            let saved = match config.device_type {
                DeviceType::Wgpu => train_and_save::<GpuBackend>(&config, WgpuDevice::default(), &output)?,
                DeviceType::Cpu => train_and_save::<CpuBackend>(&config, NdArrayDevice::default(), &output)?,
            };
            println!("学習完了: {} に保存しました", saved.display());
        }
        Command::Extract {
            model,
            image,
            device,
            solve,
        } => {
            apply_device(&mut config, device)?;
            let solve = apply_solver(&mut config, solve)?;
            let model_path = model.unwrap_or_else(|| PathBuf::from(&config.model.model_path));

            match config.device_type {
                DeviceType::Wgpu => {
                    let recognizer = DigitRecognizer::<Wgpu>::load(&model_path, WgpuDevice::default())?;
                    extract_and_print(&image, &recognizer, &config, solve)?;
                }
                DeviceType::Cpu => {
                    let recognizer = DigitRecognizer::<NdArray>::load(&model_path, NdArrayDevice::default())?;
                    extract_and_print(&image, &recognizer, &config, solve)?;
                }
            }
        }
        Command::Run { image, device, solve } => {
            apply_device(&mut config, device)?;
            let solve = apply_solver(&mut config, solve)?;
            config.display();

            match config.device_type {
                DeviceType::Wgpu => train_and_extract::<GpuBackend>(&config, WgpuDevice::default(), &image, solve)?,
                DeviceType::Cpu => train_and_extract::<CpuBackend>(&config, NdArrayDevice::default(), &image, solve)?,
            }
        }
    }

    Ok(())
}

fn apply_device(config: &mut AppConfig, device: Option<String>) -> Result<()> {
    if let Some(device) = device {
        config.device_type = device.parse()?;
    }
    tracing::info!("計算デバイス: {}", config.device_type);
    Ok(())
}

/// `--solver` を設定に反映し、解くかどうかを返す
fn apply_solver(config: &mut AppConfig, args: SolveArgs) -> Result<bool> {
    if let Some(solver) = args.solver {
        config.solver.algorithm = solver.parse()?;
    }
    Ok(args.solve)
}

fn train_and_save<B: AutodiffBackend>(config: &AppConfig, device: B::Device, output: &Path) -> Result<PathBuf> {
    let trained = train_model::<B>(&config.training, device)?;
    save_trained_model(trained, config.training.num_epochs, output)
        .with_context(|| format!("モデルの保存に失敗しました: {}", output.display()))
}

fn train_and_extract<B: AutodiffBackend>(
    config: &AppConfig,
    device: B::Device,
    image: &Path,
    solve: bool,
) -> Result<()> {
    let trained = train_model::<B>(&config.training, device.clone())?;
    let recognizer = DigitRecognizer::<B::InnerBackend>::new(trained.model, device, IMAGE_SIZE);
    extract_and_print(image, &recognizer, config, solve)
}

fn extract_and_print<B: burn::tensor::backend::Backend>(
    image: &Path,
    recognizer: &DigitRecognizer<B>,
    config: &AppConfig,
    solve: bool,
) -> Result<()> {
    let grid = extract_sudoku(image, recognizer, config)?;
    tracing::info!("読み取ったマス: {} / 81", grid.filled_count());
    println!("{}", grid);

    if solve {
        print_solution(&grid, config)?;
    }
    Ok(())
}

fn print_solution(grid: &SudokuGrid, config: &AppConfig) -> Result<()> {
    tracing::info!("{} で解いています", config.solver.algorithm);
    let mut solver = new_solver(config.solver.algorithm);
    match solve_sudoku(grid, solver.as_mut())? {
        Some(solution) => {
            println!("Sudoku solution:");
            println!("{}", solution);
        }
        None => println!("UNSATISFIABLE"),
    }
    Ok(())
}
