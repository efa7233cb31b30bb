pub mod runtime;

mod test_bench;
