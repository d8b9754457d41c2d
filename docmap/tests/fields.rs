//! Field codecs exercised through the store: wire forms, round trips, and
//! rejected writes.

mod common;

use std::str::FromStr;
use std::sync::Arc;

use docmap::bson::{Bson, doc};
use docmap::chrono::{DateTime, Utc};
use docmap::memory::MemoryBackend;
use docmap::prelude::*;
use docmap::rust_decimal::Decimal;

use common::Person;

mapped! {
    pub struct Invoice in "invoices" {
        identity iid,
        amount: decimal(2),
        issued_at: datetime,
        contact: email,
        tally: int,
    }
}

fn millis(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .expect("valid test timestamp")
        .with_timezone(&Utc)
}

#[tokio::test]
async fn decimal_round_trips_as_a_scaled_integer() -> MapResult<()> {
    let backend = MemoryBackend::new();
    let (store, _) = common::store_over(backend.clone());

    let invoice = Arc::new(Invoice::new());
    invoice.set_amount(Decimal::from_str("12.45").unwrap())?;
    store.add(&invoice)?;
    store.flush().await?;

    // the wire form is the scaled mantissa
    let raw = backend.find("invoices", doc! {}, None, None).await?;
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0].get("amount"), Some(&Bson::Int64(1245)));

    // a fresh session decodes it back exactly
    let (fresh, _) = common::store_over(backend);
    let reloaded = fresh
        .get::<Invoice>(invoice.iid().unwrap())
        .await?
        .unwrap();
    assert_eq!(reloaded.amount()?, Some(Decimal::from_str("12.45").unwrap()));
    Ok(())
}

#[tokio::test]
async fn over_precise_decimal_is_rejected_without_corruption() -> MapResult<()> {
    let invoice = Invoice::new();
    invoice.set_amount(Decimal::from_str("12.45").unwrap())?;

    let err = invoice
        .set_amount(Decimal::from_str("12.345678").unwrap())
        .unwrap_err();
    assert!(matches!(err, MapError::Validation(_)));
    // the rejected write left the prior value in place
    assert_eq!(invoice.amount()?, Some(Decimal::from_str("12.45").unwrap()));
    Ok(())
}

#[tokio::test]
async fn datetime_round_trips_at_backend_precision() -> MapResult<()> {
    let backend = MemoryBackend::new();
    let (store, _) = common::store_over(backend.clone());

    // millisecond precision survives the backend untouched
    let issued = millis("2012-01-01T12:34:56.789Z");
    let invoice = Arc::new(Invoice::new());
    invoice.set_issued_at(issued)?;
    store.add(&invoice)?;
    store.flush().await?;

    let (fresh, _) = common::store_over(backend);
    let reloaded = fresh
        .get::<Invoice>(invoice.iid().unwrap())
        .await?
        .unwrap();
    assert_eq!(reloaded.issued_at()?, Some(issued));
    Ok(())
}

#[tokio::test]
async fn email_shape_is_validated_on_write() -> MapResult<()> {
    let invoice = Invoice::new();
    invoice.set_contact("jane.doe@example.com")?;

    let err = invoice.set_contact("not-an-address").unwrap_err();
    assert!(matches!(err, MapError::Validation(_)));
    assert_eq!(invoice.contact()?.as_deref(), Some("jane.doe@example.com"));
    Ok(())
}

#[tokio::test]
async fn integers_decode_from_narrow_documents() -> MapResult<()> {
    let backend = MemoryBackend::new();
    let (store, _) = common::store_over(backend.clone());

    // a document written by some other producer may carry Int32
    let id = backend
        .save("invoices", doc! { "tally": Bson::Int32(7) })
        .await?;
    let invoice = store.get::<Invoice>(id).await?.unwrap();
    assert_eq!(invoice.tally()?, Some(7));
    Ok(())
}

#[tokio::test]
async fn defaults_apply_until_a_value_is_written() -> MapResult<()> {
    let person = Person::new();
    assert_eq!(person.name()?, "");
    person.set_name("John")?;
    assert_eq!(person.name()?, "John");

    // fields without a default simply read as absent
    let invoice = Invoice::new();
    assert_eq!(invoice.tally()?, None);
    Ok(())
}
