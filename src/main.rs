fn main() {
    radar_nowcast::cli::run();
}
