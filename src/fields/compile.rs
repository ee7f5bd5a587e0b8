//! Filter-tree compilation.
//!
//! Leaf nodes dispatch through the handler registry; group nodes recurse
//! over their children and join them with the children's own logical
//! connectives, parenthesized. Compilation is synchronous and CPU-bound.

use super::{FieldError, FieldResult, FilterContext, HandlerRegistry};
use crate::meta::{ComparisonOp, Filter, LogicalOp, MetaStore, ViewId};
use crate::sql::token::{Token, TokenStream};

/// Compile one filter node (leaf or group) into a predicate fragment.
pub fn compile_filter(
    registry: &HandlerRegistry,
    store: &MetaStore,
    ctx: &FilterContext,
    filter: &Filter,
) -> FieldResult<TokenStream> {
    filter.validate()?;

    if filter.is_group {
        let children = store.child_filters(&filter.id);
        let inner = compile_filter_list(registry, store, ctx, &children)?;
        if inner.is_empty() {
            return Ok(inner);
        }
        return Ok(inner.parenthesized());
    }

    let column_id = filter
        .fk_column_id
        .as_ref()
        .ok_or_else(|| FieldError::Meta(crate::meta::MetaError::StructuralConflict(
            format!("leaf filter {} has no target column", filter.id),
        )))?;
    let column = store.column(column_id)?;
    let op = filter.comparison_op.unwrap_or(ComparisonOp::Eq);
    let handler = registry.resolve_or_unsupported(column.uidt, ctx.dialect, op)?;
    handler.verify_filter(ctx, column, filter)?;
    handler.compile_filter(ctx, column, filter)
}

/// Compile sibling filters, joined by each following sibling's own
/// logical connective (the first sibling's connective is ignored).
pub fn compile_filter_list(
    registry: &HandlerRegistry,
    store: &MetaStore,
    ctx: &FilterContext,
    filters: &[Filter],
) -> FieldResult<TokenStream> {
    let mut out = TokenStream::new();
    for filter in filters {
        let fragment = compile_filter(registry, store, ctx, filter)?;
        if fragment.is_empty() {
            continue;
        }
        if !out.is_empty() {
            let connective = match filter.logical_op {
                LogicalOp::And => Token::And,
                LogicalOp::Or => Token::Or,
            };
            out.space().push(connective).space();
        }
        out.append(&fragment);
    }
    Ok(out)
}

/// Compile a view's root filters into one predicate fragment.
pub fn compile_view_filters(
    registry: &HandlerRegistry,
    store: &MetaStore,
    ctx: &FilterContext,
    view: &ViewId,
) -> FieldResult<TokenStream> {
    let roots = store.root_filters(view);
    compile_filter_list(registry, store, ctx, &roots)
}
