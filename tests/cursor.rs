//! Tests for the blocking result cursor against scripted server streams.

use std::cell::Cell;

use zero_postgres_cursor::protocol::backend::write::ResponseScript;
use zero_postgres_cursor::protocol::backend::AsyncMessage;
use zero_postgres_cursor::protocol::types::oid;
use zero_postgres_cursor::sync::{Conn, Cursor};
use zero_postgres_cursor::{
    ColumnInfo, ColumnLayout, ConnState, Connection, CursorOpts, CursorState, Error, FormatCode,
    TransactionStatus,
};

fn conn(script: ResponseScript) -> Conn<std::io::Cursor<Vec<u8>>> {
    Conn::new(std::io::Cursor::new(script.build()))
}

fn single_row() -> CursorOpts {
    CursorOpts {
        single_row: true,
        ..Default::default()
    }
}

#[test]
fn test_two_statements_records_affected() {
    let mut conn = conn(
        ResponseScript::new()
            .select_ints(3)
            .layout(&[("n", oid::INT4)])
            .complete("SELECT 0")
            .ready(),
    );
    let mut cursor = Cursor::new(&mut conn, CursorOpts::default());

    let mut seen = Vec::new();
    while cursor.read().unwrap() {
        seen.push(cursor.get_i32(0).unwrap());
    }
    assert_eq!(seen, vec![1, 2, 3]);
    assert_eq!(cursor.state(), CursorState::BetweenResults);
    assert!(!cursor.read().unwrap());

    assert!(cursor.next_result().unwrap());
    assert!(!cursor.read().unwrap());
    assert!(!cursor.next_result().unwrap());
    assert_eq!(cursor.state(), CursorState::Consumed);
    assert!(!cursor.read().unwrap());
    assert!(!cursor.next_result().unwrap());

    assert_eq!(cursor.records_affected(), Some(3));
}

#[test]
fn test_single_row_mode_keeps_true_count() {
    let mut conn = conn(ResponseScript::new().select_ints(5).ready());
    let mut cursor = Cursor::new(&mut conn, single_row());

    assert!(cursor.read().unwrap());
    assert_eq!(cursor.get_i32(0).unwrap(), 1);
    assert!(!cursor.read().unwrap());
    assert!(!cursor.read().unwrap());
    assert_eq!(cursor.records_affected(), Some(5));
    assert!(!cursor.next_result().unwrap());
    drop(cursor);

    assert_eq!(conn.messages_read(), 8);
    assert_eq!(conn.state(), ConnState::Ready);
}

#[test]
fn test_single_row_mode_per_result_set() {
    let mut conn = conn(ResponseScript::new().select_ints(4).select_ints(2).ready());
    let mut cursor = Cursor::new(&mut conn, single_row());

    assert!(cursor.read().unwrap());
    assert!(!cursor.read().unwrap());
    assert!(cursor.next_result().unwrap());
    assert!(cursor.read().unwrap());
    assert_eq!(cursor.get_i64(0).unwrap(), 1);
    assert!(!cursor.read().unwrap());
    assert!(!cursor.next_result().unwrap());
    assert_eq!(cursor.records_affected(), Some(6));
}

#[test]
fn test_get_without_row_is_caller_misuse() {
    let mut conn = conn(ResponseScript::new().select_ints(1).ready());
    let mut cursor = Cursor::new(&mut conn, CursorOpts::default());

    let err = cursor.get_i32(0).unwrap_err();
    assert!(matches!(err, Error::InvalidReadPosition));
    assert!(err.is_caller_misuse());
    assert!(!err.is_protocol_violation());
    assert_eq!(cursor.state(), CursorState::InResult);
    assert!(cursor.is_null(0).unwrap_err().is_caller_misuse());

    // Nothing was consumed from the stream
    assert!(cursor.read().unwrap());
    assert_eq!(cursor.get_i32(0).unwrap(), 1);
    assert!(!cursor.read().unwrap());
    assert!(matches!(cursor.get_i32(0), Err(Error::InvalidReadPosition)));
}

#[test]
fn test_row_without_layout_is_protocol_violation() {
    let mut conn = conn(ResponseScript::new().row(&[Some("1")]).complete("SELECT 1").ready());
    let mut cursor = Cursor::new(&mut conn, CursorOpts::default());

    let err = cursor.read().unwrap_err();
    assert!(err.is_protocol_violation());
    assert!(matches!(cursor.read(), Err(Error::ConnectionBroken)));
    assert!(matches!(cursor.next_result(), Err(Error::ConnectionBroken)));
    cursor.close().unwrap();
    assert!(cursor.is_closed());
    drop(cursor);

    assert!(conn.is_broken());
    // No drain was attempted after the violation
    assert_eq!(conn.messages_read(), 1);
}

#[test]
fn test_close_is_idempotent() {
    let closed = Cell::new(0);
    let mut conn = conn(ResponseScript::new().select_ints(3).select_ints(2).ready());
    let mut cursor = Cursor::new(&mut conn, CursorOpts::default());
    cursor.on_close(|completion| {
        assert_eq!(completion.records_affected(), Some(5));
        closed.set(closed.get() + 1);
    });

    assert!(cursor.read().unwrap());
    cursor.close().unwrap();
    assert!(cursor.is_closed());
    assert_eq!(closed.get(), 1);

    cursor.close().unwrap();
    assert!(!cursor.read().unwrap());
    assert!(!cursor.next_result().unwrap());
    drop(cursor);

    assert_eq!(closed.get(), 1);
    assert_eq!(conn.messages_read(), 10);
    assert_eq!(conn.state(), ConnState::Ready);
}

#[test]
fn test_drop_drains_for_next_command() {
    let mut conn = conn(
        ResponseScript::new()
            .select_ints(10)
            .ready()
            .layout(&[("name", oid::TEXT)])
            .row(&[Some("second")])
            .complete("SELECT 1")
            .ready_with(TransactionStatus::InTransaction),
    );

    {
        let mut cursor = Cursor::new(&mut conn, CursorOpts::default());
        assert!(cursor.read().unwrap());
        assert!(cursor.read().unwrap());
    }
    assert_eq!(conn.state(), ConnState::Ready);

    let mut cursor = Cursor::new(&mut conn, CursorOpts::default());
    assert!(cursor.read().unwrap());
    assert_eq!(cursor.get_str(0).unwrap(), "second");
    assert!(!cursor.read().unwrap());
    assert!(!cursor.next_result().unwrap());
    assert_eq!(cursor.transaction_status(), TransactionStatus::InTransaction);
}

#[test]
fn test_next_result_skips_unread_rows() {
    let mut conn = conn(
        ResponseScript::new()
            .select_ints(100)
            .layout(&[("label", oid::VARCHAR)])
            .row(&[Some("x")])
            .complete("SELECT 1")
            .ready(),
    );
    let mut cursor = Cursor::new(&mut conn, CursorOpts::default());

    assert!(cursor.next_result().unwrap());
    assert_eq!(cursor.get_name(0).unwrap(), "label");
    assert!(cursor.read().unwrap());
    assert_eq!(cursor.get_string(0).unwrap(), "x");
    assert!(!cursor.next_result().unwrap());
    assert_eq!(cursor.records_affected(), Some(101));
}

#[test]
fn test_statement_without_rows_at_boundary_is_protocol_violation() {
    let mut conn = conn(ResponseScript::new().select_ints(1).complete("UPDATE 4").ready());
    let mut cursor = Cursor::new(&mut conn, CursorOpts::default());

    assert!(cursor.read().unwrap());
    assert!(!cursor.read().unwrap());
    let err = cursor.next_result().unwrap_err();
    assert!(err.is_protocol_violation());
    drop(cursor);
    assert!(conn.is_broken());
}

#[test]
fn test_server_error_drains_to_ready() {
    let mut conn = conn(
        ResponseScript::new()
            .layout(&[("q", oid::INT4)])
            .row(&[Some("1")])
            .error("ERROR", "22012", "division by zero")
            .ready_with(TransactionStatus::Failed),
    );
    let mut cursor = Cursor::new(&mut conn, CursorOpts::default());

    assert!(cursor.read().unwrap());
    let err = cursor.read().unwrap_err();
    assert_eq!(err.sqlstate(), Some("22012"));
    assert!(!err.is_connection_broken());
    assert_eq!(cursor.state(), CursorState::Consumed);
    assert_eq!(cursor.transaction_status(), TransactionStatus::Failed);
    assert!(!cursor.read().unwrap());
    cursor.close().unwrap();
    drop(cursor);

    assert!(!conn.is_broken());
    assert_eq!(conn.state(), ConnState::Ready);
    assert!(conn.in_transaction());
}

#[test]
fn test_fatal_server_error_breaks_connection() {
    let mut conn = conn(
        ResponseScript::new()
            .layout(&[("q", oid::INT4)])
            .error("FATAL", "57P01", "terminating connection due to administrator command"),
    );
    let mut cursor = Cursor::new(&mut conn, CursorOpts::default());

    let err = cursor.read().unwrap_err();
    assert!(err.is_connection_broken());
    assert!(matches!(cursor.read(), Err(Error::ConnectionBroken)));
    drop(cursor);
    assert!(conn.is_broken());
}

#[test]
fn test_truncated_stream_breaks_connection() {
    let mut bytes = ResponseScript::new().select_ints(2).ready().build();
    bytes.truncate(bytes.len() - 3);
    let mut conn = Conn::new(bytes.as_slice());
    let mut cursor = Cursor::new(&mut conn, CursorOpts::default());

    assert!(cursor.read().unwrap());
    assert!(cursor.read().unwrap());
    assert!(!cursor.read().unwrap());
    assert!(matches!(cursor.next_result(), Err(Error::Io(_))));
    assert!(matches!(cursor.read(), Err(Error::ConnectionBroken)));
    assert!(matches!(cursor.next_result(), Err(Error::ConnectionBroken)));
}

#[test]
fn test_sequential_access() {
    let mut conn = conn(
        ResponseScript::new()
            .layout(&[("a", oid::INT4), ("b", oid::TEXT), ("c", oid::BOOL)])
            .row(&[Some("10"), None, Some("t")])
            .complete("SELECT 1")
            .ready(),
    );
    let opts = CursorOpts {
        sequential_access: true,
        ..Default::default()
    };
    let mut cursor = Cursor::new(&mut conn, opts);

    assert!(cursor.read().unwrap());
    assert_eq!(cursor.get_i32(0).unwrap(), 10);
    assert!(cursor.is_null(1).unwrap());
    assert!(cursor.get::<Option<&str>>(1).unwrap().is_none());
    let err = cursor.get_i32(0).unwrap_err();
    assert!(matches!(err, Error::InvalidUsage(_)));
    assert!(cursor.get_bool(2).unwrap());
    assert!(!cursor.read().unwrap());
}

#[test]
fn test_sequential_access_malformed_column_poisons_cursor() {
    // One column announcing 8 bytes but carrying 1
    let malformed = [b'D', 0, 0, 0, 11, 0, 1, 0, 0, 0, 8, b'7'];
    let mut conn = conn(
        ResponseScript::new()
            .layout(&[("n", oid::INT4)])
            .bytes(&malformed)
            .complete("SELECT 1")
            .ready(),
    );
    let opts = CursorOpts {
        sequential_access: true,
        ..Default::default()
    };
    let mut cursor = Cursor::new(&mut conn, opts);

    let err = cursor.read().unwrap_err();
    assert!(err.is_protocol_violation());
    assert!(matches!(cursor.read(), Err(Error::ConnectionBroken)));
    assert!(matches!(cursor.get_i32(0), Err(Error::InvalidReadPosition)));
    drop(cursor);

    assert!(conn.is_broken());
    assert_eq!(conn.messages_read(), 2);
}

#[test]
fn test_read_consumes_previous_row() {
    let mut conn = conn(
        ResponseScript::new()
            .layout(&[("s", oid::TEXT)])
            .row(&[Some("first")])
            .row(&[Some("second")])
            .complete("SELECT 2")
            .ready(),
    );
    let mut cursor = Cursor::new(&mut conn, CursorOpts::default());

    assert!(cursor.read().unwrap());
    assert!(cursor.read().unwrap());
    assert_eq!(cursor.get_str(0).unwrap(), "second");
    assert!(!cursor.read().unwrap());
}

#[test]
fn test_layout_refresh_later_layout_wins() {
    let mut conn = conn(
        ResponseScript::new()
            .layout(&[("old", oid::INT4)])
            .layout(&[("new", oid::TEXT), ("extra", oid::INT8)])
            .row(&[Some("v"), Some("9")])
            .complete("SELECT 1")
            .ready(),
    );
    let mut cursor = Cursor::new(&mut conn, CursorOpts::default());

    assert!(cursor.read().unwrap());
    assert_eq!(cursor.field_count(), 2);
    assert_eq!(cursor.get_ordinal("EXTRA").unwrap(), 1);
    assert_eq!(cursor.get_i64(1).unwrap(), 9);
}

#[test]
fn test_empty_query() {
    let mut conn = conn(ResponseScript::new().empty().ready());
    let mut cursor = Cursor::new(&mut conn, CursorOpts::default());

    assert!(!cursor.read().unwrap());
    assert_eq!(cursor.state(), CursorState::BetweenResults);
    assert!(!cursor.next_result().unwrap());
    assert_eq!(cursor.records_affected(), None);
}

#[test]
fn test_result_set_after_empty_query() {
    let mut conn = conn(ResponseScript::new().empty().select_ints(2).ready());
    let mut cursor = Cursor::new(&mut conn, CursorOpts::default());

    assert!(!cursor.read().unwrap());
    assert!(cursor.next_result().unwrap());
    assert!(cursor.read().unwrap());
    assert!(cursor.read().unwrap());
    assert!(!cursor.read().unwrap());
    assert!(!cursor.next_result().unwrap());
    assert_eq!(cursor.records_affected(), Some(2));
}

#[test]
fn test_row_after_completion_is_protocol_violation() {
    for script in [
        ResponseScript::new().select_ints(1).row(&[Some("2")]).ready(),
        ResponseScript::new().empty().row(&[Some("2")]).ready(),
    ] {
        let mut conn = conn(script);
        let mut cursor = Cursor::new(&mut conn, CursorOpts::default());
        while cursor.read().unwrap() {}
        assert_eq!(cursor.state(), CursorState::BetweenResults);
        assert!(cursor.layout().is_none());

        let err = cursor.next_result().unwrap_err();
        assert!(err.is_protocol_violation());
        drop(cursor);
        assert!(conn.is_broken());
    }
}

#[test]
fn test_close_drain_counts_completions_past_boundary() {
    let mut conn = conn(
        ResponseScript::new()
            .select_ints(1)
            .complete("UPDATE 4")
            .select_ints(2)
            .ready(),
    );
    let mut cursor = Cursor::new(&mut conn, CursorOpts::default());

    assert!(cursor.read().unwrap());
    assert!(!cursor.read().unwrap());
    assert_eq!(cursor.state(), CursorState::BetweenResults);
    cursor.close().unwrap();
    assert_eq!(cursor.records_affected(), Some(7));
    drop(cursor);

    assert_eq!(conn.state(), ConnState::Ready);
    assert_eq!(conn.messages_read(), 9);
}

#[test]
fn test_close_drain_rejects_row_without_layout() {
    let mut conn = conn(ResponseScript::new().select_ints(1).row(&[Some("9")]).ready());
    let mut cursor = Cursor::new(&mut conn, CursorOpts::default());

    assert!(cursor.read().unwrap());
    assert!(!cursor.read().unwrap());
    assert!(cursor.close().unwrap_err().is_protocol_violation());
    assert!(cursor.is_closed());
    drop(cursor);

    assert!(conn.is_broken());
}

#[test]
fn test_completion_metadata() {
    let mut conn = conn(ResponseScript::new().complete("CREATE TABLE").ready());
    let mut cursor = Cursor::new(&mut conn, CursorOpts::default());
    assert!(!cursor.read().unwrap());
    assert!(!cursor.next_result().unwrap());
    assert_eq!(cursor.records_affected(), None);
    assert_eq!(cursor.last_generated_id(), None);
    drop(cursor);

    let mut conn = self::conn(
        ResponseScript::new()
            .layout(&[("id", oid::INT8)])
            .row(&[Some("1")])
            .complete("INSERT 16401 1")
            .ready(),
    );
    let mut cursor = Cursor::new(&mut conn, CursorOpts::default());
    assert!(cursor.read().unwrap());
    assert!(!cursor.read().unwrap());
    assert_eq!(cursor.records_affected(), Some(1));
    assert_eq!(cursor.last_generated_id(), Some(16401));
}

#[test]
fn test_async_messages_are_absorbed() {
    let mut conn = conn(
        ResponseScript::new()
            .layout(&[("n", oid::INT4)])
            .notice("relation already exists, skipping")
            .row(&[Some("1")])
            .parameter("TimeZone", "UTC")
            .complete("SELECT 1")
            .ready(),
    );
    let mut cursor = Cursor::new(&mut conn, CursorOpts::default());
    assert!(cursor.read().unwrap());
    assert!(!cursor.read().unwrap());
    assert!(!cursor.next_result().unwrap());
    drop(cursor);

    let messages = conn.take_async_messages();
    assert_eq!(messages.len(), 2);
    assert!(matches!(&messages[0], AsyncMessage::Notice(fields)
        if fields.message.as_deref() == Some("relation already exists, skipping")));
    assert_eq!(conn.server_params()[0].1, "UTC");
}

#[test]
fn test_prepared_layout_and_binary_columns() {
    let layout = ColumnLayout::new(vec![
        ColumnInfo {
            name: "id".into(),
            table_oid: 0,
            column_id: 0,
            type_oid: oid::INT4,
            type_size: 4,
            type_modifier: -1,
            format: FormatCode::Binary,
        },
        ColumnInfo {
            name: "payload".into(),
            table_oid: 0,
            column_id: 0,
            type_oid: oid::BYTEA,
            type_size: -1,
            type_modifier: -1,
            format: FormatCode::Binary,
        },
    ]);
    let id = 42_i32.to_be_bytes();
    let mut conn = conn(
        ResponseScript::new()
            .raw_row(&[Some(id.as_slice()), Some(b"\x00\xff".as_slice())])
            .complete("SELECT 1")
            .ready(),
    );
    let mut cursor = Cursor::with_layout(&mut conn, CursorOpts::default(), layout);

    assert_eq!(cursor.field_count(), 2);
    assert!(cursor.read().unwrap());
    assert_eq!(cursor.get_i32(0).unwrap(), 42);
    assert_eq!(cursor.get_bytes(1).unwrap(), vec![0x00, 0xff]);
    assert_eq!(cursor.get_type_oid(1).unwrap(), oid::BYTEA);
    assert!(matches!(cursor.get_str(0), Err(Error::Unsupported(_))));
}

#[test]
fn test_close_connection_on_close() {
    let mut conn = conn(ResponseScript::new().select_ints(2).ready());
    let opts = CursorOpts::try_from("postgres://localhost/app?close_connection=true").unwrap();
    let mut cursor = Cursor::new(&mut conn, opts);
    assert!(cursor.read().unwrap());
    cursor.close().unwrap();
    drop(cursor);

    assert_eq!(conn.state(), ConnState::Closed);
}
