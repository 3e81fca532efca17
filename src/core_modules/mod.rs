pub mod blob;
pub mod blob_detector;
pub mod contour;
pub mod envelope_window;
pub mod geometry;
pub mod imaging;
pub mod roi_block;
pub mod vbc_decoder;
pub mod vlc_decoder;
