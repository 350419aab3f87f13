fn main() {
    if let Err(err) = flight_ontime::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
