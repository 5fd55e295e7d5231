// Path: crates/ipc/build.rs
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use the vendored compiler unless the environment pins one.
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }
    let well_known = protoc_bin_vendored::include_path()?;

    tonic_build::configure().compile(
        &[
            "proto/vm.proto",
            "proto/rpcdb.proto",
            "proto/keystore.proto",
            "proto/sharedmemory.proto",
            "proto/aliasreader.proto",
            "proto/subnetlookup.proto",
            "proto/appsender.proto",
            "proto/validatorstate.proto",
            "proto/messenger.proto",
            "proto/ghttp.proto",
        ],
        &[std::path::PathBuf::from("proto"), well_known],
    )?;

    Ok(())
}
