fn main() {
    #[cfg(not(any(feature = "sqlite", feature = "postgres")))]
    compile_error!("one of feature \"sqlite\" or feature \"postgres\" must be enabled");
}
