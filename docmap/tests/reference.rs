//! Reference fields: assignment, shadowed local identities, and resolution
//! through a fresh session.

mod common;

use std::sync::Arc;

use docmap::memory::MemoryBackend;
use docmap::prelude::*;

mapped! {
    pub struct Company in "companies" {
        identity id,
        title: string = "",
    }
}

mapped! {
    pub struct Employee in "employees" {
        identity id,
        name: string = "",
        company_id: id,
        company: reference(Company, company_id),
    }
}

#[tokio::test]
async fn assignment_updates_object_and_local_identity_together() -> MapResult<()> {
    let (store, _) = common::store();

    let company = Arc::new(Company::new());
    company.set_title("Acme")?;
    store.add(&company)?;
    store.flush().await?;

    let employee = Arc::new(Employee::new());
    employee.set_company(Some(&company))?;
    assert_eq!(employee.company_id()?, company.id());

    let resolved = employee.company().await?.expect("reference was assigned");
    assert!(Arc::ptr_eq(&resolved, &company));
    Ok(())
}

#[tokio::test]
async fn transient_target_resolves_to_the_live_instance() -> MapResult<()> {
    let company = Arc::new(Company::new());
    let employee = Arc::new(Employee::new());

    employee.set_company(Some(&company))?;
    // the target has no identity yet, so the local field stays empty
    assert_eq!(employee.company_id()?, None);

    let resolved = employee.company().await?.expect("reference was assigned");
    assert!(Arc::ptr_eq(&resolved, &company));
    Ok(())
}

#[tokio::test]
async fn cleared_and_unset_references_read_as_none() -> MapResult<()> {
    let employee = Arc::new(Employee::new());
    // never assigned
    assert!(employee.company().await?.is_none());

    let company = Arc::new(Company::new());
    employee.set_company(Some(&company))?;
    employee.set_company(None)?;
    assert!(employee.company().await?.is_none());
    assert_eq!(employee.company_id()?, None);
    Ok(())
}

#[tokio::test]
async fn fresh_session_resolves_with_a_single_lookup() -> MapResult<()> {
    let backend = MemoryBackend::new();
    let (store, _) = common::store_over(backend.clone());

    let company = Arc::new(Company::new());
    company.set_title("Acme")?;
    store.add(&company)?;
    let employee = Arc::new(Employee::new());
    employee.set_name("Jane")?;
    store.add(&employee)?;
    store.flush().await?;

    // link after both have identities, then persist the link
    employee.set_company(Some(&company))?;
    store.flush().await?;

    // a fresh session with an empty cache
    let (fresh, log) = common::store_over(backend);
    let reloaded = fresh
        .get::<Employee>(employee.id().unwrap())
        .await?
        .expect("employee was saved");
    log.take();

    let resolved = reloaded.company().await?.expect("link survived the reload");
    assert_eq!(resolved.title()?, "Acme");
    assert!(!Arc::ptr_eq(&resolved, &company));

    // exactly one backend lookup, addressed at the companies collection
    let ops = log.take();
    assert_eq!(common::op_names(&ops), ["find"]);
    assert_eq!(ops[0].collection, "companies");

    // a second read is served by the identity map
    let again = reloaded.company().await?.unwrap();
    assert!(Arc::ptr_eq(&resolved, &again));
    assert!(log.is_empty());
    Ok(())
}
