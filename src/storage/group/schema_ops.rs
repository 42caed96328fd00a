use tracing::{debug, info, warn};

use super::Group;
use crate::error::{LinkError, Result};
use crate::storage::backlink::BacklinkColumn;
use crate::storage::link::LinkColumn;
use crate::storage::table::{Column, Table};
use crate::storage::types::{LinkSpec, ValueKind};
use crate::types::{ColKey, ColumnRef, TableKey};

impl Group {
    /// Adds an empty table.
    pub fn add_table(&mut self, name: &str) -> Result<TableKey> {
        self.insert_table(name, None)
    }

    /// Adds an empty table whose rows are identified by a unique int or string key.
    pub fn add_table_with_primary_key(
        &mut self,
        name: &str,
        pk_column: &str,
        kind: ValueKind,
    ) -> Result<TableKey> {
        self.insert_table(name, Some((pk_column, kind)))
    }

    fn insert_table(&mut self, name: &str, pk: Option<(&str, ValueKind)>) -> Result<TableKey> {
        if self.names.contains_key(name) {
            return Err(LinkError::NameInUse(name.to_owned()));
        }
        let key = TableKey(self.tables.len() as u32);
        let mut table = Table::new(key, name.to_owned());
        if let Some((pk_column, kind)) = pk {
            table.add_primary_key_column(pk_column, kind)?;
        }
        self.tables.push(Some(table));
        self.names.insert(name.to_owned(), key);
        debug!(table = name, key = key.0, "table added");
        Ok(key)
    }

    /// Adds a value column. Existing rows get null, or the kind's zero value when the
    /// column is not nullable.
    pub fn add_column(
        &mut self,
        table: TableKey,
        name: &str,
        kind: ValueKind,
        nullable: bool,
    ) -> Result<ColKey> {
        self.table_mut(table)?.add_value_column(name, kind, nullable)
    }

    /// Creates a link column on `origin` together with its backlink column on the target
    /// table, binding both sides.
    pub fn add_link_column(&mut self, origin: TableKey, spec: LinkSpec<'_>) -> Result<ColKey> {
        self.table(spec.target)?;
        let origin_table = self.table(origin)?;
        origin_table.check_link_name(spec.name)?;
        let rows = origin_table.len();

        let link_key = self.table_mut(origin)?.allocate_col();
        let col = ColumnRef::new(origin, link_key);

        let target_table = self.table_mut(spec.target)?;
        let backlink_key = target_table.allocate_col();
        let mut backlink = BacklinkColumn::new(backlink_key, spec.target, target_table.len());
        backlink.bind_origin(col)?;
        target_table.push_column(Column::Backlink(backlink));

        let mut link = LinkColumn::new(
            link_key,
            origin,
            spec.name.to_owned(),
            spec.kind,
            spec.weak,
            rows,
        );
        link.bind_target(spec.target)?;
        link.bind_backlink(backlink_key)?;
        self.table_mut(origin)?.push_column(Column::Link(link));

        self.touch(col)?;
        debug!(
            column = spec.name,
            kind = %spec.kind,
            origin = origin.0,
            target = spec.target.0,
            weak = spec.weak,
            "link column added"
        );
        Ok(link_key)
    }

    /// Switches a link column between weak and strong after checking that both halves
    /// of the pairing are still intact.
    pub fn set_link_strength(&mut self, col: ColumnRef, weak: bool) -> Result<()> {
        let backlink = self.paired_backlink(col)?;
        if backlink.origin()? != col {
            return Err(crate::error::broken_invariant(format!(
                "backlink column paired with {col} mirrors {}",
                backlink.origin()?
            )));
        }
        self.link_column_mut(col)?.set_weak(weak);
        self.touch(col)
    }

    /// Drops a column. A link column takes its backlink column with it.
    pub fn remove_column(&mut self, table: TableKey, col: ColKey) -> Result<()> {
        let paired = {
            let owner = self.table(table)?;
            match owner.column(col)? {
                Column::Backlink(_) => {
                    return Err(LinkError::Logic(
                        "backlink columns are dropped together with their link column",
                    ))
                }
                Column::Value(_) if owner.primary_key_column() == Some(col) => {
                    return Err(LinkError::Logic("primary key column cannot be removed"))
                }
                Column::Value(_) => None,
                Column::Link(link) => Some((link.target()?, link.backlink()?)),
            }
        };
        if let Some((target, backlink)) = paired {
            self.table_mut(target)?.remove_column(backlink)?;
        }
        self.table_mut(table)?.remove_column(col)?;
        debug!(table = table.0, column = col.0, "column removed");
        Ok(())
    }

    /// Checks the cross-table guard for [`Group::remove_table`] without changing anything.
    pub fn can_remove_table(&self, key: TableKey) -> Result<()> {
        let table = self.table(key)?;
        if table.is_empty() {
            return Ok(());
        }
        for origin in self.tables().filter(|t| t.key() != key) {
            for link in origin.links() {
                if link.target_table() == Some(key) && !link.is_weak() {
                    warn!(
                        table = table.name(),
                        origin = origin.name(),
                        column = link.name(),
                        "table removal blocked by strong link column"
                    );
                    return Err(LinkError::CrossTableLinkTarget {
                        target: table.name().to_owned(),
                        origin: origin.name().to_owned(),
                        column: link.name().to_owned(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Removes a table. Incoming link columns from other tables are dropped with it,
    /// which is only allowed when they are weak or the table is empty.
    pub fn remove_table(&mut self, key: TableKey) -> Result<()> {
        self.can_remove_table(key)?;

        let incoming: Vec<ColumnRef> = self
            .tables()
            .filter(|t| t.key() != key)
            .flat_map(|t| t.links())
            .filter(|link| link.target_table() == Some(key))
            .map(LinkColumn::column_ref)
            .collect();
        for col in incoming {
            self.remove_column(col.table, col.col)?;
        }

        let outgoing: Vec<(TableKey, ColKey)> = self
            .table(key)?
            .links()
            .map(|link| -> Result<(TableKey, ColKey)> { Ok((link.target()?, link.backlink()?)) })
            .collect::<Result<Vec<_>>>()?;
        for (target, backlink) in outgoing {
            if target != key {
                self.table_mut(target)?.remove_column(backlink)?;
            }
        }

        let name = self.table(key)?.name().to_owned();
        self.tables[key.0 as usize] = None;
        self.names.remove(&name);
        info!(table = %name, "table removed");
        Ok(())
    }
}
