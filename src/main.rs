fn main() {
    hsi_prep::cli::run();
}
