pub mod schema;

pub use schema::{
    HorizontalAnchor, ProductionJob, StampColor, StampPosition, StampStyle, VerticalAnchor,
};
