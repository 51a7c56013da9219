//! Lifecycle through the exported C symbols.
//!
//! The exported engine is process-global, so this file holds a single test.

use less_envelope::{
    Buffer, Config, Engine, EnvelopeClient, Error, FfiEngine, KmsType, MetastoreType,
};

fn config() -> Config {
    Config::builder()
        .kms(KmsType::Static)
        .metastore(MetastoreType::Memory)
        .service_name("TestService")
        .product_id("TestProduct")
        .build()
        .expect("valid config")
}

#[test]
fn ffi_lifecycle() {
    // Raw calls before setup report "not initialized".
    let partition = Buffer::encode_str("partition").unwrap();
    let data = Buffer::encode_bytes(b"mysecretdata").unwrap();
    let mut out = Buffer::allocate(1024).unwrap();
    assert_eq!(FfiEngine.encrypt_to_json(&partition, &data, &mut out), -100);

    let client = EnvelopeClient::with_engine(FfiEngine);
    client.setup(&config()).unwrap();

    // A second setup of the shared engine is refused by the engine itself.
    let second = EnvelopeClient::with_engine(FfiEngine);
    assert!(matches!(
        second.setup(&config()),
        Err(Error::SetupError { code: -101 })
    ));

    let envelope = client.encrypt_to_json("partition", b"mysecretdata").unwrap();
    assert_eq!(
        client.decrypt_from_json("partition", &envelope).unwrap(),
        b"mysecretdata"
    );
    let record = client.encrypt("partition", b"mysecretdata").unwrap();
    assert_eq!(
        client.decrypt("partition", &record).unwrap(),
        b"mysecretdata"
    );
    assert!(client.decrypt_from_json("partition2", &envelope).is_err());

    // Undersized output is reported, never overrun.
    let mut tiny = Buffer::allocate(4).unwrap();
    assert_eq!(FfiEngine.encrypt_to_json(&partition, &data, &mut tiny), -3);
    assert_eq!(tiny.declared_len(), 4);

    // Null pointers are rejected at the boundary.
    let status = unsafe {
        less_envelope_engine::ffi::EncryptToJson(
            std::ptr::null(),
            data.as_ptr(),
            out.as_mut_ptr(),
        )
    };
    assert_eq!(status, -1);

    client.shutdown().unwrap();
    assert_eq!(FfiEngine.encrypt_to_json(&partition, &data, &mut out), -100);
}
