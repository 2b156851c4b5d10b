use tonic_build::manual::{Builder, Method, Service};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The message types live in src/proto.rs, so only the service stubs are
    // generated here and no protoc is needed at build time.
    let cosi_driver = Service::builder()
        .name("CosiDriver")
        .package("cosi.v1alpha1")
        .comment("Object storage provisioning driver.")
        .method(
            Method::builder()
                .name("create_bucket")
                .route_name("CreateBucket")
                .comment("Create a named bucket and return its driver-side identifier.")
                .input_type("super::CreateBucketRequest")
                .output_type("super::CreateBucketResponse")
                .codec_path("tonic_prost::ProstCodec")
                .build(),
        )
        .build();

    Builder::new().compile(&[cosi_driver]);
    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
