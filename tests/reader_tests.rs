//! Streaming reader tests against the mock transport, including the
//! mid-stream exception scenarios.

mod common;

use bytes::{
    Bytes,
    BytesMut,
};
use clickhouse_http_client::{
    Error,
    QueryOptions,
    QueryRequest,
    Value,
};
use common::{
    exception_sentinel,
    mock_client,
    rbwnat_body,
    MockResponse,
    MockTransport,
};
use tokio_util::sync::CancellationToken;

fn three_int_rows() -> Bytes {
    rbwnat_body(
        &[("n", "UInt64")],
        &[
            vec![Value::UInt64(1)],
            vec![Value::UInt64(2)],
            vec![Value::UInt64(3)],
        ],
    )
}

#[tokio::test]
async fn reads_rows_and_ends_cleanly() {
    let transport = MockTransport::new();
    transport.push(
        MockResponse::ok()
            .header("X-ClickHouse-Query-Id", "qid-7")
            .header("X-ClickHouse-Timezone", "Europe/Amsterdam")
            .header("X-ClickHouse-Summary", r#"{"read_rows":"3"}"#)
            .chunk(three_int_rows()),
    );
    let client = mock_client(&transport);

    let mut cursor = client.query_reader("SELECT n").await.unwrap();
    assert_eq!(cursor.query_id(), "qid-7");
    assert_eq!(cursor.server_timezone(), Some("Europe/Amsterdam"));
    assert_eq!(cursor.stats().read_rows, 3);
    assert_eq!(cursor.columns().len(), 1);
    assert_eq!(cursor.columns()[0].name, "n");

    let mut seen = Vec::new();
    while cursor.read_row().await.unwrap() {
        seen.push(cursor.get(0).unwrap().clone());
    }
    assert_eq!(
        seen,
        vec![Value::UInt64(1), Value::UInt64(2), Value::UInt64(3)]
    );

    // Past the end, read_row keeps answering false.
    assert!(!cursor.read_row().await.unwrap());
}

#[tokio::test]
async fn survives_arbitrary_chunk_boundaries() {
    let transport = MockTransport::new();
    transport.push(
        MockResponse::ok()
            .chunk(rbwnat_body(
                &[("s", "String"), ("v", "Nullable(Int64)")],
                &[
                    vec![Value::from("hello"), Value::Int64(-1)],
                    vec![Value::from("world"), Value::Null],
                ],
            ))
            .shattered(),
    );
    let client = mock_client(&transport);

    let rows = client.query_rows("SELECT s, v").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.rows[0][0], Value::from("hello"));
    assert_eq!(rows.rows[1][1], Value::Null);
}

#[tokio::test]
async fn midstream_exception_with_tag_header() {
    let tag = "PU1FNUFH98";
    let mut body = BytesMut::new();
    body.extend_from_slice(&rbwnat_body(
        &[("n", "UInt64")],
        &[
            vec![Value::UInt64(1)],
            vec![Value::UInt64(2)],
            vec![Value::UInt64(3)],
        ],
    ));
    body.extend_from_slice(&exception_sentinel(tag, "Code: 395. boom"));

    let transport = MockTransport::new();
    transport.push(
        MockResponse::ok()
            .header("X-ClickHouse-Exception-Tag", tag)
            .chunk(body.freeze()),
    );
    let client = mock_client(&transport);

    let mut cursor = client.query_reader("SELECT n").await.unwrap();
    for _ in 0..3 {
        assert!(cursor.read_row().await.unwrap());
    }
    match cursor.read_row().await {
        Err(Error::ServerStream { code, message }) => {
            assert_eq!(code, 395);
            assert!(message.contains("boom"), "message was {:?}", message);
        }
        other => panic!("expected ServerStream, got {:?}", other),
    }
}

#[tokio::test]
async fn midstream_sentinel_without_tag_header() {
    // Same body, but the response never carried the tag header: the
    // premature end must surface as a plain unexpected end of stream.
    let tag = "PU1FNUFH98";
    let mut body = BytesMut::new();
    body.extend_from_slice(&rbwnat_body(
        &[("n", "UInt64")],
        &[vec![Value::UInt64(1)]],
    ));
    body.extend_from_slice(&exception_sentinel(tag, "Code: 395. boom"));

    let transport = MockTransport::new();
    transport.push(MockResponse::ok().chunk(body.freeze()));
    let client = mock_client(&transport);

    let mut cursor = client.query_reader("SELECT n").await.unwrap();
    assert!(cursor.read_row().await.unwrap());
    assert!(matches!(
        cursor.read_row().await,
        Err(Error::UnexpectedEndOfStream)
    ));
}

#[tokio::test]
async fn clean_end_ignores_buffered_marker() {
    // The sentinel-looking text sits INSIDE a legitimate string value; the
    // stream ends on a row boundary, so no error may be raised.
    let tag = "ABCDEFGHIJ";
    let spooky = format!("__exception__{tag}\nCode: 1. fake\n");
    let transport = MockTransport::new();
    transport.push(
        MockResponse::ok()
            .header("X-ClickHouse-Exception-Tag", tag)
            .chunk(rbwnat_body(
                &[("s", "String")],
                &[vec![Value::from(spooky.as_str())]],
            )),
    );
    let client = mock_client(&transport);

    let rows = client.query_rows("SELECT s").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows.rows[0][0], Value::from(spooky.as_str()));
}

#[tokio::test]
async fn truncated_row_without_sentinel() {
    let full = three_int_rows();
    // Cut the body inside the third row's value.
    let cut = full.len() - 3;
    let transport = MockTransport::new();
    transport
        .push(MockResponse::ok().chunk(full.slice(..cut)));
    let client = mock_client(&transport);

    let mut cursor = client.query_reader("SELECT n").await.unwrap();
    assert!(cursor.read_row().await.unwrap());
    assert!(cursor.read_row().await.unwrap());
    assert!(matches!(
        cursor.read_row().await,
        Err(Error::UnexpectedEndOfStream)
    ));
}

#[tokio::test]
async fn unknown_column_type_rejected_at_open() {
    let mut w = clickhouse_http_client::io::ByteWriter::new();
    w.write_varint(1);
    w.write_string("c");
    w.write_string("FancyNewType(7)");
    let transport = MockTransport::new();
    transport.push(MockResponse::ok().chunk(w.into_bytes()));
    let client = mock_client(&transport);

    assert!(matches!(
        client.query_reader("SELECT c").await,
        Err(Error::Parse { .. })
    ));
}

#[tokio::test]
async fn get_requires_a_current_row() {
    let transport = MockTransport::new();
    transport.push(
        MockResponse::ok().chunk(rbwnat_body(&[("n", "UInt8")], &[])),
    );
    let client = mock_client(&transport);

    let mut cursor = client.query_reader("SELECT n").await.unwrap();
    assert!(matches!(cursor.get(0), Err(Error::InvalidState(_))));
    assert!(!cursor.read_row().await.unwrap());
    assert!(matches!(cursor.get(0), Err(Error::InvalidState(_))));
}

#[tokio::test]
async fn cancellation_fails_next_read() {
    let token = CancellationToken::new();
    let transport = MockTransport::new();
    transport.push(
        MockResponse::ok()
            .chunk(rbwnat_body(
                &[("n", "UInt64")],
                &[vec![Value::UInt64(1)], vec![Value::UInt64(2)]],
            ))
            .shattered(),
    );
    let client = mock_client(&transport);

    let query = QueryRequest::new("SELECT n")
        .options(QueryOptions::new().cancellation(token.clone()));
    let mut cursor = client.query_reader(query).await.unwrap();
    assert!(cursor.read_row().await.unwrap());

    token.cancel();
    assert!(matches!(cursor.read_row().await, Err(Error::Cancelled)));
}

#[tokio::test]
async fn strings_as_bytes_setting_applies() {
    use clickhouse_http_client::{
        http::HttpTransport,
        Client,
        Settings,
    };
    use std::sync::Arc;

    let transport = MockTransport::new();
    transport.push(
        MockResponse::ok()
            .chunk(rbwnat_body(&[("s", "String")], &[vec![Value::from("hi")]])),
    );
    let settings: Settings = "ReadStringsAsByteArrays=true".parse().unwrap();
    let transport_dyn: Arc<dyn HttpTransport> = transport.clone();
    let client = Client::with_transport(settings, transport_dyn).unwrap();

    let rows = client.query_rows("SELECT s").await.unwrap();
    assert_eq!(rows.rows[0][0], Value::Bytes(b"hi".to_vec()));
}
