fn main() {
    // LogService stubs; the messages are hand-written prost types.
    if std::env::var("CARGO_FEATURE_GRPC").is_ok() {
        let service = tonic_build::manual::Service::builder()
            .name("LogService")
            .package("logs")
            .method(
                tonic_build::manual::Method::builder()
                    .name("write_log")
                    .route_name("WriteLog")
                    .input_type("crate::rpc::grpc::LogRequest")
                    .output_type("crate::rpc::grpc::LogResponse")
                    .codec_path("tonic::codec::ProstCodec")
                    .build(),
            )
            .build();

        tonic_build::manual::Builder::new().compile(&[service]);
    }
}
