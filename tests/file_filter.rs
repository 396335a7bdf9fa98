mod common;

use common::{Form, submit};
use std::{
    error::Error,
    sync::{Arc, Mutex},
};
use upload_bridge::{Multer, UploadErrorKind, adapt};

#[tokio::test]
async fn skipped_files_are_left_out() {
    let upload = adapt(
        Multer::builder()
            .file_filter(|_, file| Ok(file.field_name != "notme"))
            .build(),
    );

    let view = submit(
        &upload.any(),
        Form::new()
            .field("name", "Multer")
            .file("notme", "tiny0.dat")
            .file("butme", "tiny1.dat"),
    )
    .await
    .unwrap();

    let files = view.files.unwrap();
    let files = files.as_list().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].field_name, "butme");
    assert_eq!(files[0].original_name, "tiny1.dat");
    assert!(view.body.unwrap().contains_key("name"));
}

#[tokio::test]
async fn filter_errors_abort_the_upload() {
    let upload = adapt(
        Multer::builder()
            .file_filter(|_, _| Err("Fake error".into()))
            .build(),
    );

    let err = submit(&upload.single("test"), Form::new().file("test", "tiny0.dat"))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Fake error");
    assert_eq!(err.field(), Some("test"));
    assert_eq!(err.code(), None);
    assert!(matches!(err.kind(), UploadErrorKind::Filter { .. }));
    assert_eq!(err.source().unwrap().to_string(), "Fake error");
}

#[tokio::test]
async fn filter_sees_request_and_file_metadata() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    let upload = adapt(
        Multer::builder()
            .file_filter(move |req, file| {
                record.lock().unwrap().push((
                    req.uri.path().to_string(),
                    file.field_name.clone(),
                    file.original_name.clone(),
                    file.mime_type.clone(),
                    file.encoding.clone(),
                ));
                Ok(true)
            })
            .build(),
    );

    submit(&upload.single("doc"), Form::new().file("doc", "small1.dat"))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(
        seen.as_slice(),
        [(
            "/upload".to_string(),
            "doc".to_string(),
            "small1.dat".to_string(),
            "application/octet-stream".to_string(),
            "7bit".to_string(),
        )]
    );
}
