#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

fn main() {
    let args = pgroute::app::parse();
    // `init_config` exits the process on a parse error, so this only ever
    // yields `Ok`.
    let config = pgroute::app::init_config(&args).expect("init_config exits on error");
    pgroute::app::init_logging(&args);

    if let Err(err) = pgroute::app::run_server(args, config) {
        eprintln!("fatal: {err}");
        std::process::exit(exitcode::SOFTWARE);
    }
}
