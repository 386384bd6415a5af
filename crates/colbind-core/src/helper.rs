//! Stateless translation from column definitions to serializers and blocks.
//!
//! [`column_serializers`] and [`block_definition`] are index-aligned only when
//! called with the same definitions; [`serializers_and_block`] builds both from
//! one value.

use crate::block::{Block, BlockColumn};
use crate::error::ColbindError;
use crate::schema::ColumnDefinition;
use crate::serializer::{ColumnSerializer, ColumnSerializers};
use crate::types::{DataType, TypeParseError};

pub fn column_serializers(definitions: &[ColumnDefinition]) -> Result<ColumnSerializers, ColbindError> {
    definitions
        .iter()
        .map(|def| resolve_type(def).map(ColumnSerializer::new))
        .collect()
}

pub fn block_definition(definitions: &[ColumnDefinition]) -> Result<Block, ColbindError> {
    let mut block = Block::new();
    for def in definitions {
        block.push_column(BlockColumn::new(def.name.clone(), resolve_type(def)?));
    }
    Ok(block)
}

pub fn serializers_and_block(
    definitions: &[ColumnDefinition],
) -> Result<(ColumnSerializers, Block), ColbindError> {
    let serializers = column_serializers(definitions)?;
    let block = block_definition(definitions)?;
    Ok((serializers, block))
}

fn resolve_type(def: &ColumnDefinition) -> Result<DataType, ColbindError> {
    DataType::parse(&def.declared_type).map_err(|err| match err {
        TypeParseError::UnknownFamily(family) => {
            ColbindError::UnsupportedType(format!("{family} (column {})", def.name))
        }
        TypeParseError::Malformed { declared, reason } => ColbindError::SchemaParse { declared, reason },
    })
}
