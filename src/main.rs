fn main() {
    if let Err(err) = railmesh::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
