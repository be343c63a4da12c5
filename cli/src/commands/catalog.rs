//! Catalog commands

use anyhow::Result;
use colored::Colorize;
use portal_core::form::{render, validate, RenderedField, Widget};
use portal_core::models::{Availability, CatalogItem};
use portal_core::FormValues;
use tabled::Tabled;

use super::{assignments, Portal};
use crate::output::{cell, truncate, OutputFormat};
use crate::CatalogCommands;

#[derive(Tabled)]
struct ItemRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&CatalogItem> for ItemRow {
    fn from(item: &CatalogItem) -> Self {
        Self {
            id: item.sys_id.clone(),
            name: item.name.clone(),
            category: item.category.clone(),
            description: truncate(&item.short_description, 60),
        }
    }
}

#[derive(Tabled)]
struct WidgetRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Input")]
    input: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Help")]
    help: String,
}

impl From<&RenderedField> for WidgetRow {
    fn from(field: &RenderedField) -> Self {
        let label = if field.mandatory { format!("{} *", field.label) } else { field.label.clone() };
        let value = match (&field.value, field.error) {
            (_, Some(error)) => format!("! {}", error),
            (Some(value), None) => cell(value),
            (None, None) => String::new(),
        };
        let help = field.help_text.clone().or_else(|| field.placeholder.clone()).unwrap_or_default();

        Self { field: field.name.clone(), label, input: describe(&field.widget), value, help }
    }
}

/// Widget kind plus its options, e.g. `select [new|replacement]`.
fn describe(widget: &Widget) -> String {
    match widget {
        Widget::Select { options } | Widget::ReferencePicker { options } => {
            let values: Vec<&str> = options.iter().map(|o| o.value.as_str()).collect();
            format!("{} [{}]", widget.name(), truncate(&values.join("|"), 48))
        }
        Widget::TextArea { max_length: Some(max) } => format!("{} (max {})", widget.name(), max),
        other => other.name().to_string(),
    }
}

pub async fn handle(action: CatalogCommands, portal: &Portal) -> Result<()> {
    match action {
        CatalogCommands::List { list, all } => {
            let mut query = list.query();
            if !all {
                query.availability = Some(Availability::Available);
            }
            let page = portal.service.list_catalog_items(&query).await?;
            portal.format.print_list(&page, || page.items.iter().map(ItemRow::from).collect())?;
            if matches!(portal.format, OutputFormat::Table) {
                println!("Page {} of {} ({} items)", page.page, page.total_pages.max(1), page.total);
            }
        }
        CatalogCommands::Get { id } => {
            let item = portal.service.get_catalog_item(&id).await?;
            portal.format.print(&item)?;
        }
        CatalogCommands::Categories => {
            let categories = portal.service.list_categories().await?;
            portal.format.print_list(&categories, || {
                categories.iter().map(|c| ItemCategory { category: c.clone() }).collect()
            })?;
        }
        CatalogCommands::Form { id, values } => {
            let item = portal.service.get_catalog_item(&id).await?;
            let fields = portal.service.get_item_form(&id).await?;
            let entered: FormValues = assignments(&fields, &values)?.into_iter().collect();
            let errors = if values.is_empty() { Default::default() } else { validate(&fields, &entered) };
            let rendered = render(&fields, &entered, &errors);

            if matches!(portal.format, OutputFormat::Table) {
                println!("{} {}", item.name.bold(), format!("({})", item.sys_id).dimmed());
                if !item.description.is_empty() {
                    println!("{}", item.description);
                }
            }
            portal.format.print_list(&rendered, || rendered.iter().map(WidgetRow::from).collect())?;
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct ItemCategory {
    #[tabled(rename = "Category")]
    category: String,
}
