fn main() -> Result<(), Box<dyn std::error::Error>> {
    // fabric-protos subset: common, msp and the peer Endorser service
    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        .compile(
            &[
                "proto/common/common.proto",
                "proto/msp/identities.proto",
                "proto/peer/peer.proto",
            ],
            &["proto"],
        )?;

    Ok(())
}
