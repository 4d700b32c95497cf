use tokio_postgres::types::ToSql;

pub type SqlArg = Box<dyn ToSql + Send + Sync>;

/// Model types describe how they land in the database by converting
/// themselves into one of the builders below.
pub trait Inserter {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder;
}

pub trait Filter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder;
}

pub trait Updater {
    fn into_update_builder(self, table: &'static str) -> UpdateBuilder;
}

pub struct InsertBuilder {
    table: &'static str,
    columns: Vec<&'static str>,
    args: Vec<SqlArg>,
    extra: Option<String>,
}

impl InsertBuilder {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            columns: Vec::new(),
            args: Vec::new(),
            extra: None,
        }
    }

    pub fn with_arg<V: ToSql + Send + Sync + 'static>(mut self, column: &'static str, value: V) -> Self {
        self.columns.push(column);
        self.args.push(Box::new(value));
        self
    }

    /// Raw SQL appended between VALUES and RETURNING, used for ON CONFLICT
    /// merge clauses.
    pub fn with_extra<S: Into<String>>(mut self, extra: S) -> Self {
        self.extra = Some(extra.into());
        self
    }

    pub fn build(self) -> (String, Vec<SqlArg>) {
        let placeholders = (1..=self.args.len())
            .map(|i| format!("${}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let mut query = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            self.columns.join(", "),
            placeholders
        );
        if let Some(extra) = self.extra {
            query.push(' ');
            query.push_str(&extra);
        }
        query.push_str(" RETURNING *;");

        (query, self.args)
    }
}

pub struct FilteredOperationBuilder {
    table: &'static str,
    filters: Vec<(&'static str, &'static str, SqlArg)>,
    extra: Option<String>,
}

impl FilteredOperationBuilder {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            filters: Vec::new(),
            extra: None,
        }
    }

    pub fn with_filter<V: ToSql + Send + Sync + 'static>(self, column: &'static str, value: V) -> Self {
        self.with_filter_cmp(column, "=", value)
    }

    pub fn with_filter_cmp<V: ToSql + Send + Sync + 'static>(
        mut self,
        column: &'static str,
        cmp: &'static str,
        value: V,
    ) -> Self {
        self.filters.push((column, cmp, Box::new(value)));
        self
    }

    /// Raw SQL appended after the WHERE clause (ORDER BY, LIMIT, ...).
    /// Only honored by SELECT.
    pub fn with_extra<S: Into<String>>(mut self, extra: S) -> Self {
        self.extra = Some(extra.into());
        self
    }

    fn where_clause(&self, first_index: usize) -> String {
        let mut out = String::new();
        for (i, (column, cmp, _)) in self.filters.iter().enumerate() {
            if i == 0 {
                out.push_str(" WHERE ");
            } else {
                out.push_str(" AND ");
            }
            out.push_str(&format!("{} {} ${}", column, cmp, first_index + i));
        }
        out
    }

    pub fn build_select(self) -> (String, Vec<SqlArg>) {
        let mut query = format!("SELECT * FROM {}{}", self.table, self.where_clause(1));
        if let Some(ref extra) = self.extra {
            query.push(' ');
            query.push_str(extra);
        }
        query.push(';');

        let args = self.filters.into_iter().map(|(_, _, arg)| arg).collect();
        (query, args)
    }

    pub fn build_delete(self) -> (String, Vec<SqlArg>) {
        let query = format!(
            "DELETE FROM {}{} RETURNING *;",
            self.table,
            self.where_clause(1)
        );

        let args = self.filters.into_iter().map(|(_, _, arg)| arg).collect();
        (query, args)
    }
}

pub struct UpdateBuilder {
    base: FilteredOperationBuilder,
    values: Vec<(&'static str, SqlArg)>,
}

impl From<FilteredOperationBuilder> for UpdateBuilder {
    fn from(base: FilteredOperationBuilder) -> Self {
        Self {
            base,
            values: Vec::new(),
        }
    }
}

impl UpdateBuilder {
    pub fn with_value<V: ToSql + Send + Sync + 'static>(mut self, column: &'static str, value: V) -> Self {
        self.values.push((column, Box::new(value)));
        self
    }

    pub fn build(self) -> (String, Vec<SqlArg>) {
        let assignments = self
            .values
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{} = ${}", column, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "UPDATE {} SET {}{} RETURNING *;",
            self.base.table,
            assignments,
            self.base.where_clause(self.values.len() + 1)
        );

        let mut args: Vec<SqlArg> = self.values.into_iter().map(|(_, arg)| arg).collect();
        args.extend(self.base.filters.into_iter().map(|(_, _, arg)| arg));
        (query, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_builder_numbers_placeholders_from_one() {
        let (query, args) = InsertBuilder::new("cart_items")
            .with_arg("customer", 1234)
            .with_arg("product_id", 5555)
            .with_arg("quantity", 1)
            .build();

        assert_eq!(
            query,
            "INSERT INTO cart_items (customer, product_id, quantity) VALUES ($1, $2, $3) RETURNING *;"
        );
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn insert_builder_places_extra_before_returning() {
        let (query, _) = InsertBuilder::new("cart_items")
            .with_arg("customer", 1234)
            .with_extra("ON CONFLICT DO NOTHING")
            .build();

        assert_eq!(
            query,
            "INSERT INTO cart_items (customer) VALUES ($1) ON CONFLICT DO NOTHING RETURNING *;"
        );
    }

    #[test]
    fn select_without_filters_has_no_where_clause() {
        let (query, args) = FilteredOperationBuilder::new("orders")
            .with_extra("ORDER BY created_at DESC")
            .build_select();

        assert_eq!(query, "SELECT * FROM orders ORDER BY created_at DESC;");
        assert!(args.is_empty());
    }

    #[test]
    fn select_chains_filters_with_and() {
        let (query, args) = FilteredOperationBuilder::new("orders")
            .with_filter("customer", 1234)
            .with_filter_cmp("created_at", ">=", 0i64)
            .build_select();

        assert_eq!(
            query,
            "SELECT * FROM orders WHERE customer = $1 AND created_at >= $2;"
        );
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn delete_returns_removed_rows() {
        let (query, _) = FilteredOperationBuilder::new("cart_items")
            .with_filter("customer", 1234)
            .build_delete();

        assert_eq!(query, "DELETE FROM cart_items WHERE customer = $1 RETURNING *;");
    }

    #[test]
    fn update_numbers_values_before_filters() {
        let builder = FilteredOperationBuilder::new("orders").with_filter("id", 7);
        let (query, args) = UpdateBuilder::from(builder)
            .with_value("state", "Payé")
            .with_value("payment_status", "paid")
            .build();

        assert_eq!(
            query,
            "UPDATE orders SET state = $1, payment_status = $2 WHERE id = $3 RETURNING *;"
        );
        assert_eq!(args.len(), 3);
    }
}
