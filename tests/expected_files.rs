mod common;

use common::{Form, submit};
use serde_json::json;
use upload_bridge::{FieldSpec, Files, Limits, Multer, adapt};

#[tokio::test]
async fn rejects_a_single_unexpected_file() {
    let upload = adapt(Multer::new());

    let err = submit(
        &upload.single("butme"),
        Form::new()
            .file("notme", "tiny0.dat")
            .file("butme", "tiny1.dat"),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), Some("LIMIT_UNEXPECTED_FILE"));
    assert_eq!(err.field(), Some("notme"));
}

#[tokio::test]
async fn rejects_an_array_overflow() {
    let upload = adapt(Multer::new());

    let err = submit(
        &upload.array("butme", Some(4)),
        Form::new()
            .file("butme", "tiny0.dat")
            .file("butme", "tiny1.dat")
            .file("butme", "tiny0.dat")
            .file("butme", "tiny1.dat")
            .file("butme", "tiny0.dat"),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), Some("LIMIT_UNEXPECTED_FILE"));
    assert_eq!(err.field(), Some("butme"));
}

#[tokio::test]
async fn accepts_an_array_up_to_its_bound() {
    let upload = adapt(Multer::new());

    let view = submit(
        &upload.array("butme", Some(2)),
        Form::new()
            .file("butme", "tiny0.dat")
            .file("butme", "tiny1.dat"),
    )
    .await
    .unwrap();

    assert_eq!(view.files.unwrap().len(), 2);
}

#[tokio::test]
async fn accepts_listed_fields() {
    let upload = adapt(Multer::new());

    let view = submit(
        &upload.fields([
            FieldSpec::unbounded("butme"),
            FieldSpec::new("andme", 1),
        ]),
        Form::new()
            .file("butme", "tiny0.dat")
            .file("butme", "tiny1.dat")
            .file("andme", "empty.dat"),
    )
    .await
    .unwrap();

    let Some(Files::Fields(map)) = view.files else {
        panic!("expected files keyed by field");
    };
    assert_eq!(map.len(), 2);
    assert_eq!(map["butme"].len(), 2);
    assert_eq!(map["butme"][0].original_name, "tiny0.dat");
    assert_eq!(map["butme"][1].original_name, "tiny1.dat");
    assert_eq!(map["andme"][0].size, 0);
}

#[tokio::test]
async fn rejects_a_field_outside_the_list() {
    let upload = adapt(Multer::new());

    let err = submit(
        &upload.fields([FieldSpec::new("butme", 1)]),
        Form::new()
            .file("butme", "tiny0.dat")
            .file("andme", "tiny1.dat"),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), Some("LIMIT_UNEXPECTED_FILE"));
    assert_eq!(err.field(), Some("andme"));
}

#[tokio::test]
async fn any_keeps_arrival_order() {
    let upload = adapt(Multer::new());

    let view = submit(
        &upload.any(),
        Form::new()
            .file("butme", "tiny0.dat")
            .file("butme", "tiny1.dat")
            .file("andme", "empty.dat"),
    )
    .await
    .unwrap();

    let files = view.files.unwrap();
    let order: Vec<_> = files
        .as_list()
        .unwrap()
        .iter()
        .map(|f| (f.field_name.as_str(), f.original_name.as_str()))
        .collect();
    assert_eq!(
        order,
        [
            ("butme", "tiny0.dat"),
            ("butme", "tiny1.dat"),
            ("andme", "empty.dat"),
        ]
    );
}

#[tokio::test]
async fn none_rejects_any_file() {
    let upload = adapt(Multer::new());

    let err = submit(
        &upload.none(),
        Form::new().field("name", "Multer").file("sneaky", "tiny1.dat"),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), Some("LIMIT_UNEXPECTED_FILE"));
    assert_eq!(err.field(), Some("sneaky"));
}

#[tokio::test]
async fn empty_file_inputs_are_ignored() {
    let single = adapt(Multer::new()).single("avatar");

    let view = submit(
        &single,
        Form::new().field("name", "x").file_named("other", "", b""),
    )
    .await
    .unwrap();
    assert_eq!(view.body.unwrap()["name"], json!("x"));
    assert!(view.file.is_none());

    let view = submit(&single, Form::new().file_named("avatar", "", b""))
        .await
        .unwrap();
    assert!(view.file.is_none());
}

#[tokio::test]
async fn empty_file_inputs_do_not_count_against_limits() {
    let upload = adapt(
        Multer::builder()
            .limits(Limits {
                files: Some(1),
                ..Limits::default()
            })
            .build(),
    );

    let view = submit(
        &upload.array("photos", Some(1)),
        Form::new()
            .file_named("photos", "", b"")
            .file("photos", "tiny0.dat"),
    )
    .await
    .unwrap();

    let files = view.files.unwrap();
    let files = files.as_list().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].original_name, "tiny0.dat");
}

#[tokio::test]
async fn unnamed_octet_streams_are_neither_files_nor_fields() {
    let none = adapt(Multer::new()).none();

    let view = submit(
        &none,
        Form::new().field("name", "x").raw_part(
            "Content-Disposition: form-data; name=\"blob\"\r\nContent-Type: application/octet-stream",
            &[0xff, 0xfe, 0x00, 0x01],
        ),
    )
    .await
    .unwrap();

    let body = view.body.unwrap();
    assert_eq!(body.len(), 1);
    assert!(!body.contains_key("blob"));
}

#[tokio::test]
async fn strips_client_directories_unless_preserved() {
    let data = b"payload";

    let plain = adapt(Multer::new()).single("doc");
    let view = submit(&plain, Form::new().file_named("doc", "a/b/report.txt", data))
        .await
        .unwrap();
    assert_eq!(view.file.unwrap().original_name, "report.txt");

    let preserving = adapt(Multer::builder().preserve_path(true).build()).single("doc");
    let view = submit(&preserving, Form::new().file_named("doc", "a/b/report.txt", data))
        .await
        .unwrap();
    assert_eq!(view.file.unwrap().original_name, "a/b/report.txt");
}
