pub mod pool;

pub use pool::{available_workers, ConversionPool, ConversionResult, ConversionTask, OrderedConversions};
