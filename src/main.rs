fn main() {
    if let Err(err) = pandada::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
