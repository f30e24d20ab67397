pub mod bake;
