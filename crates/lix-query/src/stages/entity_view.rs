use lix_schema::{lixcol_name, EntityViewDef};

use crate::ast::{Expr, OrderBy, Select, SelectItem};
use crate::error::QueryResult;
use crate::stage::{RewriteContext, RewriteStage, StageOutcome, STATE_ALL_VIEW, STATE_VIEW};

/// Rewrites reads of an entity view into reads of the generic state views.
///
/// Property columns become `snapshot_content ->> 'prop'`, `lixcol_*` columns
/// become the state column they name, and the schema key is pinned in the
/// WHERE clause. `*` expands to the view's columns so the output keeps the
/// view's shape.
pub struct EntityViewStage;

impl EntityViewStage {
    fn column(def: &EntityViewDef, name: String) -> Expr {
        if def.is_property(&name) {
            Expr::json_extract(Expr::column("snapshot_content"), name)
        } else if let Some(base) = lixcol_name(&name) {
            Expr::column(base)
        } else {
            Expr::Column(name)
        }
    }
}

impl RewriteStage for EntityViewStage {
    fn name(&self) -> &str {
        "entity-view"
    }

    fn rewrite(&self, select: Select, context: &RewriteContext) -> QueryResult<StageOutcome> {
        let Some(table) = select.table() else {
            return Ok(StageOutcome::Skipped(select));
        };
        let Some(def) = context.view_named(table) else {
            return Ok(StageOutcome::Skipped(select));
        };
        let target = if table == def.view_name {
            STATE_VIEW
        } else {
            STATE_ALL_VIEW
        };
        let mut map = |name: String| Self::column(def, name);

        let mut projection = Vec::with_capacity(select.projection.len());
        for item in select.projection {
            match item {
                SelectItem::Wildcard => {
                    for column in def.columns() {
                        projection.push(SelectItem::Expr {
                            expr: Self::column(def, column.clone()),
                            alias: Some(column),
                        });
                    }
                }
                SelectItem::Expr { expr, alias } => {
                    let name = alias.unwrap_or_else(|| expr.to_string());
                    projection.push(SelectItem::Expr {
                        expr: expr.map_columns(&mut map),
                        alias: Some(name),
                    });
                }
            }
        }

        let mut rewritten = Select {
            distinct: select.distinct,
            projection,
            from: select.from.map(|mut from| {
                from.name = target.to_string();
                from
            }),
            selection: select.selection.map(|e| e.map_columns(&mut map)),
            order_by: select
                .order_by
                .into_iter()
                .map(|o| OrderBy {
                    expr: o.expr.map_columns(&mut map),
                    descending: o.descending,
                })
                .collect(),
            limit: select.limit,
            offset: select.offset,
        };
        rewritten.and_where(Expr::eq(
            Expr::column("schema_key"),
            Expr::text(def.schema_key.clone()),
        ));
        Ok(StageOutcome::Rewritten(rewritten))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::ast::Statement;

    fn context() -> RewriteContext {
        RewriteContext {
            active_version_id: "v-main".into(),
            views: vec![EntityViewDef {
                schema_key: "note".into(),
                view_name: "note".into(),
                all_view_name: "note_all".into(),
                property_columns: vec!["id".into(), "text".into()],
                read_only: false,
            }],
            schema_keys: ["note".to_string()].into(),
        }
    }

    fn select(sql: &str) -> Select {
        match parse(sql).unwrap() {
            Statement::Select(s) => s,
            _ => unreachable!(),
        }
    }

    #[test]
    fn maps_columns_and_pins_schema() {
        let out = EntityViewStage
            .rewrite(
                select("SELECT text FROM note_all WHERE lixcol_version_id = 'x' ORDER BY id"),
                &context(),
            )
            .unwrap();
        assert!(out.is_rewritten());
        assert_eq!(
            out.into_select().to_string(),
            "SELECT (snapshot_content ->> 'text') AS text FROM state_all \
             WHERE ((schema_key = 'note') AND (version_id = 'x')) \
             ORDER BY (snapshot_content ->> 'id')"
        );
    }

    #[test]
    fn active_view_targets_state() {
        let out = EntityViewStage
            .rewrite(select("SELECT * FROM note"), &context())
            .unwrap()
            .into_select();
        assert_eq!(out.table(), Some("state"));
        // properties then every lixcol column
        assert_eq!(out.projection.len(), 2 + lix_schema::LIXCOL_COLUMNS.len());
    }

    #[test]
    fn other_tables_are_skipped() {
        let out = EntityViewStage
            .rewrite(select("SELECT * FROM version"), &context())
            .unwrap();
        assert!(!out.is_rewritten());
    }
}
