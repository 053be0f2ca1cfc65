use std::collections::HashMap;

use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqliteConnection, SqlitePool};

use crate::irt::types::{Item, Module, ModuleItem};

fn map_item(row: &SqliteRow) -> Result<Item, sqlx::Error> {
    Ok(Item {
        id: row.try_get("id")?,
        difficulty: row.try_get("difficulty")?,
        discrimination: row.try_get("discrimination")?,
        skill: row.try_get("skill")?,
    })
}

pub async fn upsert_item<'e, E>(executor: E, item: &Item, now_ms: i64) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO "items" ("id", "difficulty", "discrimination", "skill", "updatedAt")
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT ("id") DO UPDATE SET
            "difficulty" = excluded."difficulty",
            "discrimination" = excluded."discrimination",
            "skill" = excluded."skill",
            "updatedAt" = excluded."updatedAt"
        "#,
    )
    .bind(&item.id)
    .bind(item.difficulty)
    .bind(item.discrimination)
    .bind(&item.skill)
    .bind(now_ms)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn get_item<'e, E>(executor: E, id: &str) -> Result<Option<Item>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"SELECT "id", "difficulty", "discrimination", "skill" FROM "items" WHERE "id" = ?1"#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    row.as_ref().map(map_item).transpose()
}

pub async fn list_items<'e, E>(executor: E) -> Result<Vec<Item>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"SELECT "id", "difficulty", "discrimination", "skill" FROM "items" ORDER BY "id""#,
    )
    .fetch_all(executor)
    .await?;
    rows.iter().map(map_item).collect()
}

/// Returns whether a row was touched; unknown items are left alone.
pub async fn set_item_difficulty<'e, E>(
    executor: E,
    id: &str,
    difficulty: f64,
    now_ms: i64,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result =
        sqlx::query(r#"UPDATE "items" SET "difficulty" = ?2, "updatedAt" = ?3 WHERE "id" = ?1"#)
            .bind(id)
            .bind(difficulty)
            .bind(now_ms)
            .execute(executor)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Replaces the module row and its item list. Callers own the transaction.
pub async fn upsert_module(
    conn: &mut SqliteConnection,
    module: &Module,
    now_ms: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "modules" ("id", "title", "skill", "level", "updatedAt")
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT ("id") DO UPDATE SET
            "title" = excluded."title",
            "skill" = excluded."skill",
            "level" = excluded."level",
            "updatedAt" = excluded."updatedAt"
        "#,
    )
    .bind(&module.id)
    .bind(&module.title)
    .bind(&module.skill)
    .bind(module.level)
    .bind(now_ms)
    .execute(&mut *conn)
    .await?;

    sqlx::query(r#"DELETE FROM "module_items" WHERE "moduleId" = ?1"#)
        .bind(&module.id)
        .execute(&mut *conn)
        .await?;

    for (position, item) in module.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO "module_items" ("moduleId", "position", "itemId", "title", "difficulty", "discrimination")
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&module.id)
        .bind(position as i64)
        .bind(item.item_id.as_deref())
        .bind(item.title.as_deref())
        .bind(item.difficulty)
        .bind(item.discrimination)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Whole catalog ordered by module id, items in authored order.
pub async fn list_modules(pool: &SqlitePool) -> Result<Vec<Module>, sqlx::Error> {
    let module_rows = sqlx::query(
        r#"SELECT "id", "title", "skill", "level" FROM "modules" ORDER BY "id""#,
    )
    .fetch_all(pool)
    .await?;

    let item_rows = sqlx::query(
        r#"
        SELECT "moduleId", "itemId", "title", "difficulty", "discrimination"
        FROM "module_items"
        ORDER BY "moduleId", "position"
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut items_by_module: HashMap<String, Vec<ModuleItem>> = HashMap::new();
    for row in &item_rows {
        let module_id: String = row.try_get("moduleId")?;
        items_by_module.entry(module_id).or_default().push(ModuleItem {
            item_id: row.try_get("itemId")?,
            title: row.try_get("title")?,
            difficulty: row.try_get("difficulty")?,
            discrimination: row.try_get("discrimination")?,
        });
    }

    module_rows
        .iter()
        .map(|row| -> Result<Module, sqlx::Error> {
            let id: String = row.try_get("id")?;
            let items = items_by_module.remove(&id).unwrap_or_default();
            Ok(Module {
                id,
                title: row.try_get("title")?,
                skill: row.try_get("skill")?,
                level: row.try_get("level")?,
                items,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleRef {
    pub id: String,
    pub level: i32,
    pub skill: String,
}

/// First module (by id) that lists the item.
pub async fn module_for_item<'e, E>(executor: E, item_id: &str) -> Result<Option<ModuleRef>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT m."id" AS "id", m."level" AS "level", m."skill" AS "skill"
        FROM "module_items" mi
        JOIN "modules" m ON m."id" = mi."moduleId"
        WHERE mi."itemId" = ?1
        ORDER BY m."id"
        LIMIT 1
        "#,
    )
    .bind(item_id)
    .fetch_optional(executor)
    .await?;

    row.map(|row| -> Result<ModuleRef, sqlx::Error> {
        Ok(ModuleRef {
            id: row.try_get("id")?,
            level: row.try_get("level")?,
            skill: row.try_get("skill")?,
        })
    })
    .transpose()
}

/// Item whose difficulty is closest to `theta`, skipping `exclude`.
pub async fn closest_item<'e, E>(
    executor: E,
    theta: f64,
    skill: Option<&str>,
    exclude: &[String],
) -> Result<Option<Item>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut builder = sqlx::QueryBuilder::<Sqlite>::new(
        r#"SELECT "id", "difficulty", "discrimination", "skill" FROM "items" WHERE 1 = 1"#,
    );
    if let Some(skill) = skill {
        builder.push(r#" AND "skill" = "#).push_bind(skill);
    }
    if !exclude.is_empty() {
        builder.push(r#" AND "id" NOT IN ("#);
        let mut separated = builder.separated(", ");
        for id in exclude {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");
    }
    builder
        .push(r#" ORDER BY ABS("difficulty" - "#)
        .push_bind(theta)
        .push(r#"), "id" LIMIT 1"#);

    let row = builder.build().fetch_optional(executor).await?;
    row.as_ref().map(map_item).transpose()
}
