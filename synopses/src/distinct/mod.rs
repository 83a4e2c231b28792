pub mod fm_sketch;
