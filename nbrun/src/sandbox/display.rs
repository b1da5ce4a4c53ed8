//! Notebook-style `display(obj)` for scripts.
//!
//! Values are classified by shape, not by type name: a non-empty array of
//! object maps (records) or a non-empty map of equal-length arrays (columns)
//! is tabular; anything else is generic text.

use rhai::{Array, Dynamic, Engine, Map};
use tracing::warn;

use crate::core::table::Table;
use crate::render::SharedRenderer;

/// How a displayed value is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Displayable {
    Tabular(Table),
    Generic(String),
}

impl Displayable {
    pub fn classify(value: &Dynamic) -> Self {
        if let Some(table) = records_table(value).or_else(|| columns_table(value)) {
            return Displayable::Tabular(table);
        }
        Displayable::Generic(value.to_string())
    }
}

/// `[#{a: 1}, #{a: 2, b: 3}]` -> columns in first-seen key order.
fn records_table(value: &Dynamic) -> Option<Table> {
    let items = value.clone().try_cast::<Array>()?;
    if items.is_empty() {
        return None;
    }
    let records: Vec<Map> = items
        .into_iter()
        .map(|item| item.try_cast::<Map>())
        .collect::<Option<_>>()?;

    let mut columns: Vec<String> = Vec::new();
    for record in &records {
        for key in record.keys() {
            if !columns.iter().any(|c| c == key.as_str()) {
                columns.push(key.to_string());
            }
        }
    }
    let mut table = Table::new(columns);
    for record in &records {
        let row = table
            .columns
            .iter()
            .map(|col| record.get(col.as_str()).map(cell_text).unwrap_or_default())
            .collect();
        table.push_row(row);
    }
    Some(table)
}

/// `#{a: [1, 2], b: [3, 4]}` -> one column per key.
fn columns_table(value: &Dynamic) -> Option<Table> {
    let map = value.clone().try_cast::<Map>()?;
    if map.is_empty() {
        return None;
    }
    let mut columns = Vec::with_capacity(map.len());
    let mut data: Vec<Array> = Vec::with_capacity(map.len());
    for (key, column) in map {
        columns.push(key.to_string());
        data.push(column.try_cast::<Array>()?);
    }
    let len = data[0].len();
    if data.iter().any(|column| column.len() != len) {
        return None;
    }
    let mut table = Table::new(columns);
    for idx in 0..len {
        table.push_row(data.iter().map(|column| cell_text(&column[idx])).collect());
    }
    Some(table)
}

fn cell_text(value: &Dynamic) -> String {
    if value.is_unit() {
        String::new()
    } else {
        value.to_string()
    }
}

/// Render `value` through the renderer, degrading to plain text on failure.
pub fn display_value(renderer: &SharedRenderer, value: &Dynamic) {
    let mut renderer = renderer.borrow_mut();
    let text = match Displayable::classify(value) {
        Displayable::Tabular(table) => match renderer.table(&table) {
            Ok(()) => return,
            Err(err) => {
                warn!(error = %err, "table render failed, falling back to text");
                value.to_string()
            }
        },
        Displayable::Generic(text) => text,
    };
    if let Err(err) = renderer.object(&text) {
        warn!(error = %err, "object render failed");
    }
}

/// Bind `display(obj)` in the engine.
pub fn register(engine: &mut Engine, renderer: SharedRenderer) {
    engine.register_fn("display", move |value: Dynamic| {
        display_value(&renderer, &value);
    });
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::test_support::CountingRenderer;

    fn eval(script: &str) -> Dynamic {
        Engine::new().eval::<Dynamic>(script).expect("eval")
    }

    #[test]
    fn records_are_tabular() {
        let value = eval(r#"[#{ward: "icu", age: 63}, #{ward: "general", stay: 4}]"#);
        let Displayable::Tabular(table) = Displayable::classify(&value) else {
            panic!("expected tabular");
        };
        assert_eq!(table.columns.len(), 3);
        assert_eq!(table.rows.len(), 2);
        let stay = table.columns.iter().position(|c| c == "stay").expect("stay");
        assert_eq!(table.rows[0][stay], "");
        assert_eq!(table.rows[1][stay], "4");
    }

    #[test]
    fn equal_length_columns_are_tabular() {
        let value = eval("#{age: [63, 71], stay: [4, 9]}");
        let Displayable::Tabular(table) = Displayable::classify(&value) else {
            panic!("expected tabular");
        };
        assert_eq!(table.columns, vec!["age".to_string(), "stay".to_string()]);
        assert_eq!(table.rows[1], vec!["71".to_string(), "9".to_string()]);
    }

    #[test]
    fn ragged_columns_and_scalars_are_generic() {
        assert!(matches!(
            Displayable::classify(&eval("#{age: [63, 71], stay: [4]}")),
            Displayable::Generic(_)
        ));
        assert!(matches!(
            Displayable::classify(&eval("[1, 2, 3]")),
            Displayable::Generic(_)
        ));
        assert_eq!(
            Displayable::classify(&eval(r#""hello""#)),
            Displayable::Generic("hello".to_string())
        );
        assert!(matches!(
            Displayable::classify(&eval("[]")),
            Displayable::Generic(_)
        ));
    }

    #[test]
    fn failed_table_render_degrades_to_text() {
        let counting = Rc::new(RefCell::new(CountingRenderer {
            fail_tables: true,
            ..CountingRenderer::default()
        }));
        let shared: SharedRenderer = counting.clone();
        display_value(&shared, &eval("[#{a: 1}]"));

        let counting = counting.borrow();
        assert_eq!(counting.tables, 0);
        assert_eq!(counting.objects.len(), 1);
    }

    #[test]
    fn display_is_callable_from_scripts() {
        let counting = Rc::new(RefCell::new(CountingRenderer::default()));
        let mut engine = Engine::new();
        register(&mut engine, counting.clone());
        engine
            .run(r#"display(#{a: [1], b: [2]}); display("note");"#)
            .expect("run");

        let counting = counting.borrow();
        assert_eq!(counting.tables, 1);
        assert_eq!(counting.objects, vec!["note".to_string()]);
    }
}
