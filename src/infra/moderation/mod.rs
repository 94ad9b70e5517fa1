// Implementations of the moderation ports plus the dictionary loader.

pub mod aws_sigv4;
pub mod google_nlp_client;
pub mod rekognition_client;
pub mod word_list_loader;

pub use google_nlp_client::GoogleNlpClient;
pub use rekognition_client::RekognitionClient;
pub use word_list_loader::{load_word_list, read_word_list, WordListError};
