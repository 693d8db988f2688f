fn main() {
    if let Err(e) = vetcare_lib::run() {
        eprintln!("vetcare: {e}");
        std::process::exit(1);
    }
}
