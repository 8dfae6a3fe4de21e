//! Text frames for bound views.
//!
//! `tether render` mounts a declared view on a [`ViewHost`] and prints one
//! frame per observable state: the placeholder while data is loading, then
//! the rendered view, then one frame per page walked.

use anyhow::{Result, bail};
use serde_json::Value;
use tether_engine::{
    CollectionProps, CollectionSource, CollectionView, EntityProps, LoadingPlaceholder, PageCommand, Rendered, SingleView, ViewCommand,
    ViewHost,
};
use tether_types::{ID_FIELD, NodeReference, Record, SourceInput, record_id};
use tracing::debug;

use crate::manifest::{DeclaredView, Workspace};

/// How to mount and drive a view.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Entity ids passed as input; the first one for entity views, the whole
    /// list as the member set for collection views.
    pub of: Vec<String>,
    pub limit: Option<usize>,
    pub page: usize,
    pub pages: usize,
    /// Pass stored records as input and run without any backend.
    pub offline: bool,
}

pub fn entity_frame(props: &EntityProps) -> String {
    let shape = props.source.as_ref().map_or("entity", |source| source.shape().as_str());
    let mut frame = format!("{shape} {}", props.id().unwrap_or("?"));
    let mut fields: Vec<_> = props.fields.iter().filter(|(field, _)| field.as_str() != ID_FIELD).collect();
    fields.sort_by(|(left, _), (right, _)| left.cmp(right));
    for (field, value) in fields {
        frame.push_str(&format!("\n  {field}: {}", display_value(value)));
    }
    frame
}

pub fn collection_frame(props: &CollectionProps) -> String {
    let mut frame = match &props.pages {
        Some(pages) => format!("{} (page {}, limit {})", props.data_key, pages.page(), pages.limit()),
        None => props.data_key.clone(),
    };
    if props.records.is_empty() {
        frame.push_str("\n  (no records)");
    }
    for record in &props.records {
        frame.push_str(&format!("\n  - {}", record_line(record)));
    }
    frame
}

pub fn placeholder_frame(placeholder: &LoadingPlaceholder) -> String {
    format!("[{}] {}…", placeholder.role, placeholder.label)
}

pub fn frame(rendered: Rendered<String>) -> String {
    match rendered {
        Rendered::Empty => "(nothing to show)".to_string(),
        Rendered::Loading(placeholder) => placeholder_frame(&placeholder),
        Rendered::View(text) => text,
    }
}

fn record_line(record: &Record) -> String {
    let fields: Vec<String> = record
        .iter()
        .filter(|(field, _)| field.as_str() != ID_FIELD)
        .map(|(field, value)| format!("{field}={}", display_value(value)))
        .collect();
    match record_id(record) {
        Some(id) if fields.is_empty() => id.to_string(),
        Some(id) => format!("{id}: {}", fields.join(", ")),
        None => fields.join(", "),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(text) => text.clone(),
        Value::Object(record) => record_id(record).map(str::to_string).unwrap_or_else(|| value.to_string()),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(display_value).collect();
            format!("[{}]", items.join(", "))
        }
        other => other.to_string(),
    }
}

/// Mounts `name` and returns every frame it produced.
pub async fn render_view(workspace: &Workspace, name: &str, options: &RenderOptions) -> Result<Vec<String>> {
    match workspace.view(name)? {
        DeclaredView::Entity(view) => render_entity(workspace, view, options).await,
        DeclaredView::Collection(view) => render_collection(workspace, view, options).await,
    }
}

async fn render_entity(workspace: &Workspace, view: &SingleView<String>, options: &RenderOptions) -> Result<Vec<String>> {
    let Some(id) = options.of.first() else {
        bail!("entity view '{}' needs an entity id (--of <ID>)", view.name());
    };
    let input = if options.offline {
        match workspace.backend.get(id) {
            Some(entity) => SourceInput::Record(entity.to_record()),
            None => bail!("no stored entity '{id}'"),
        }
    } else {
        SourceInput::Reference(NodeReference::new(id.clone()))
    };

    let mut host = ViewHost::mount(view, workspace.context(options.offline), Some(input))?;
    let mut frames = vec![frame(host.render())];
    host.settle().await?;
    push_changed(&mut frames, frame(host.render()));
    Ok(frames)
}

async fn render_collection(workspace: &Workspace, view: &CollectionView<String>, options: &RenderOptions) -> Result<Vec<String>> {
    let input = collection_input(workspace, view, options)?;
    let mut host = ViewHost::mount(view, workspace.context(options.offline), input)?;
    let mut frames = vec![frame(host.render())];
    host.settle().await?;

    if let Some(limit) = options.limit {
        host.dispatch(ViewCommand::Page(PageCommand::SetLimit(limit)))?;
    }
    if options.page > 0 {
        host.dispatch(ViewCommand::Page(PageCommand::SetPage(options.page)))?;
    }
    host.settle().await?;
    push_changed(&mut frames, frame(host.render()));

    for _ in 1..options.pages.max(1) {
        host.dispatch(ViewCommand::Page(PageCommand::NextPage))?;
        host.settle().await?;
        frames.push(frame(host.render()));
    }
    debug!(view = %view.name(), frames = frames.len(), "rendered collection view");
    Ok(frames)
}

fn collection_input(workspace: &Workspace, view: &CollectionView<String>, options: &RenderOptions) -> Result<Option<CollectionSource>> {
    if !options.offline {
        if options.of.is_empty() {
            return Ok(None);
        }
        let ids = options.of.iter().cloned().map(Value::String).collect();
        return Ok(Some(CollectionSource::Value(Value::Array(ids))));
    }

    let records = if options.of.is_empty() {
        workspace.backend.entities_of(view.shape()).map(|entity| entity.to_record()).collect()
    } else {
        let mut records = Vec::with_capacity(options.of.len());
        for id in &options.of {
            match workspace.backend.get(id) {
                Some(entity) => records.push(entity.to_record()),
                None => bail!("no stored entity '{id}'"),
            }
        }
        records
    };
    Ok(Some(CollectionSource::Records(records)))
}

fn push_changed(frames: &mut Vec<String>, next: String) {
    if frames.last() != Some(&next) {
        frames.push(next);
    }
}
