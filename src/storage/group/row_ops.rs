use tracing::debug;

use super::Group;
use crate::error::{LinkError, Result};
use crate::storage::link::Target;
use crate::storage::types::{Link, PrimaryKey, Value};
use crate::types::{ColKey, ColumnRef, ObjRef, TableKey};

impl Group {
    /// Appends a row to a table without a primary key.
    pub fn create_row(&mut self, table: TableKey) -> Result<ObjRef> {
        let owner = self.table_mut(table)?;
        if owner.primary_key_column().is_some() {
            return Err(LinkError::InvalidArgument(format!(
                "table '{}' requires a primary key value",
                owner.name()
            )));
        }
        let (row, _) = owner.push_row();
        owner.bump_version();
        Ok(ObjRef::new(table, row))
    }

    /// Appends a row identified by `pk`. Unresolved links naming `pk` anywhere in the
    /// group become live links to the new row.
    pub fn create_row_with_primary_key(&mut self, table: TableKey, pk: PrimaryKey) -> Result<ObjRef> {
        let owner = self.table_mut(table)?;
        owner.check_primary_key(&pk)?;
        if owner.find_primary_key(&pk).is_some() {
            return Err(LinkError::DuplicatePrimaryKey(pk.to_string()));
        }
        let (row, slot) = owner.push_row();
        owner.assign_primary_key(slot, pk.clone())?;
        owner.bump_version();
        self.resolve_pending(table, &pk, slot)?;
        Ok(ObjRef::new(table, row))
    }

    fn resolve_pending(&mut self, table: TableKey, pk: &PrimaryKey, slot: usize) -> Result<()> {
        let columns: Vec<ColumnRef> = self
            .tables()
            .flat_map(|t| t.links())
            .filter(|link| link.target_table() == Some(table))
            .map(|link| link.column_ref())
            .collect();
        for col in columns {
            let origins = self.link_column_mut(col)?.resolve(pk, slot);
            if origins.is_empty() {
                continue;
            }
            for origin_row in &origins {
                self.attach(col, *origin_row, &Target::Row(slot))?;
            }
            self.touch(col)?;
            debug!(column = %col, primary_key = %pk, resolved = origins.len(), "unresolved links resolved");
        }
        Ok(())
    }

    /// Link value naming `pk` in `table`: the live row if one exists, otherwise an
    /// unresolved reference.
    pub fn link_to_primary_key(&self, table: TableKey, pk: PrimaryKey) -> Result<Link> {
        let target = self.table(table)?;
        target.check_primary_key(&pk)?;
        Ok(match target.find_primary_key(&pk) {
            Some(row) => Link::Row(row),
            None => Link::Unresolved(pk),
        })
    }

    /// Row holding `pk`, if any.
    pub fn find_by_primary_key(&self, table: TableKey, pk: &PrimaryKey) -> Result<Option<ObjRef>> {
        Ok(self
            .table(table)?
            .find_primary_key(pk)
            .map(|row| ObjRef::new(table, row)))
    }

    /// Writes a value column cell.
    pub fn set_value(&mut self, obj: ObjRef, col: ColKey, value: Value) -> Result<()> {
        let table = self.table_mut(obj.table)?;
        let slot = table.slot(obj.row)?;
        table.set_value(slot, col, value)?;
        table.bump_version();
        Ok(())
    }

    /// Reads a value column cell.
    pub fn value(&self, obj: ObjRef, col: ColKey) -> Result<&Value> {
        self.table(obj.table)?.value(obj.row, col)
    }

    /// Whether `obj` still names a live row.
    pub fn contains(&self, obj: ObjRef) -> bool {
        self.table(obj.table)
            .map(|table| table.contains_row(obj.row))
            .unwrap_or(false)
    }
}
