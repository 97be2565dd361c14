pub mod background;
pub mod collage;
pub mod labels;
