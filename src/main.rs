fn main() {
    protoplayer::run()
}
