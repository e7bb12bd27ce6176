pub mod ml_model;
pub mod training;
pub mod inference;

pub use ml_model::{DigitClassifier, ModelConfig, NUM_CLASSES, IMAGE_SIZE, CLASS_NAMES};
pub use training::{MnistSplit, DigitItem, TrainedModel, train_model, evaluate_accuracy, save_trained_model};
pub use inference::DigitRecognizer;
