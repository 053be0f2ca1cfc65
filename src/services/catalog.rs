use crate::db::operations::catalog;
use crate::db::{now_ms, DatabaseProxy};
use crate::irt::types::{Item, Module};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

fn validate_item(item: &Item) -> Result<(), CatalogError> {
    if item.id.trim().is_empty() {
        return Err(CatalogError::Validation("item id is required".to_string()));
    }
    if item.skill.trim().is_empty() {
        return Err(CatalogError::Validation(format!("item {} has no skill", item.id)));
    }
    if !item.difficulty.is_finite() {
        return Err(CatalogError::Validation(format!("item {} difficulty must be finite", item.id)));
    }
    if !(item.discrimination.is_finite() && item.discrimination > 0.0) {
        return Err(CatalogError::Validation(format!(
            "item {} discrimination must be positive",
            item.id
        )));
    }
    Ok(())
}

fn validate_module(module: &Module) -> Result<(), CatalogError> {
    if module.id.trim().is_empty() || module.skill.trim().is_empty() {
        return Err(CatalogError::Validation("module id and skill are required".to_string()));
    }
    if module.level < 0 {
        return Err(CatalogError::Validation(format!("module {} level must be >= 0", module.id)));
    }
    let bad_item = module
        .items
        .iter()
        .any(|item| !item.difficulty.is_finite() || !(item.discrimination > 0.0));
    if bad_item {
        return Err(CatalogError::Validation(format!(
            "module {} has an item with invalid parameters",
            module.id
        )));
    }
    Ok(())
}

/// All-or-nothing: nothing is written if any item fails validation.
pub async fn upsert_items(proxy: &DatabaseProxy, items: &[Item]) -> Result<usize, CatalogError> {
    items.iter().try_for_each(validate_item)?;

    let now = now_ms();
    let mut tx = proxy.pool().begin().await?;
    for item in items {
        catalog::upsert_item(&mut *tx, item, now).await?;
    }
    tx.commit().await?;

    tracing::info!(count = items.len(), "catalog items upserted");
    Ok(items.len())
}

/// Same contract as `upsert_items`; a store error rolls back the whole batch.
pub async fn upsert_modules(proxy: &DatabaseProxy, modules: &[Module]) -> Result<usize, CatalogError> {
    modules.iter().try_for_each(validate_module)?;

    let now = now_ms();
    let mut tx = proxy.pool().begin().await?;
    for module in modules {
        catalog::upsert_module(&mut *tx, module, now).await?;
    }
    tx.commit().await?;

    tracing::info!(count = modules.len(), "catalog modules upserted");
    Ok(modules.len())
}

pub async fn list_modules(proxy: &DatabaseProxy) -> Result<Vec<Module>, CatalogError> {
    Ok(catalog::list_modules(proxy.pool()).await?)
}

pub async fn list_items(proxy: &DatabaseProxy) -> Result<Vec<Item>, CatalogError> {
    Ok(catalog::list_items(proxy.pool()).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irt::types::ModuleItem;

    #[tokio::test]
    async fn test_module_items_keep_authored_order() {
        let db = DatabaseProxy::in_memory().await.expect("db");
        let module = Module {
            id: "read-1".into(),
            title: "Reading basics".into(),
            skill: "reading".into(),
            level: 0,
            items: vec![
                ModuleItem { item_id: Some("q2".into()), title: None, difficulty: 0.5, discrimination: 1.0 },
                ModuleItem { item_id: Some("q1".into()), title: None, difficulty: -0.5, discrimination: 1.2 },
            ],
        };
        upsert_modules(&db, &[module.clone()]).await.expect("upsert");
        upsert_modules(&db, &[module.clone()]).await.expect("re-upsert");

        let stored = list_modules(&db).await.expect("list");
        assert_eq!(stored, vec![module]);
    }

    #[tokio::test]
    async fn test_module_batch_rolls_back_on_store_error() {
        let db = DatabaseProxy::in_memory().await.expect("db");
        sqlx::query(
            r#"
            CREATE TRIGGER "reject_module" BEFORE INSERT ON "modules"
            WHEN NEW."id" = 'broken'
            BEGIN SELECT RAISE(ABORT, 'rejected'); END
            "#,
        )
        .execute(db.pool())
        .await
        .expect("trigger");

        let module = |id: &str| Module {
            id: id.into(),
            title: id.into(),
            skill: "reading".into(),
            level: 0,
            items: vec![ModuleItem { item_id: None, title: None, difficulty: 0.0, discrimination: 1.0 }],
        };
        let err = upsert_modules(&db, &[module("fine"), module("broken")]).await.unwrap_err();
        assert!(matches!(err, CatalogError::Sql(_)));
        assert!(list_modules(&db).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_invalid_item_rejects_whole_batch() {
        let db = DatabaseProxy::in_memory().await.expect("db");
        let good = Item { id: "q1".into(), difficulty: 0.0, discrimination: 1.0, skill: "reading".into() };
        let bad = Item { discrimination: 0.0, id: "q2".into(), ..good.clone() };

        let err = upsert_items(&db, &[good, bad]).await.unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
        assert!(list_items(&db).await.expect("list").is_empty());
    }
}
