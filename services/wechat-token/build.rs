fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Prefer a protoc from the environment, fall back to the vendored binary
    let protoc = match std::env::var_os("PROTOC") {
        Some(path) => path.into(),
        None => protoc_bin_vendored::protoc_bin_path()?,
    };

    let mut config = prost_build::Config::new();
    config.protoc_executable(protoc);

    // pb.WechatToken server for the service, client for GrpcClient
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos_with_config(config, &["proto/wechat_token.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/wechat_token.proto");

    Ok(())
}
