pub mod bounce;
pub mod wav;
