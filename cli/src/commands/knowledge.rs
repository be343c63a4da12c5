//! Knowledge base commands

use anyhow::Result;
use colored::Colorize;
use portal_core::models::KnowledgeArticle;
use tabled::Tabled;

use super::Portal;
use crate::output::{truncate, OutputFormat};
use crate::KnowledgeCommands;

#[derive(Tabled)]
struct ArticleRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Views")]
    views: u64,
    #[tabled(rename = "Tags")]
    tags: String,
}

impl From<&KnowledgeArticle> for ArticleRow {
    fn from(a: &KnowledgeArticle) -> Self {
        Self {
            id: a.sys_id.clone(),
            title: truncate(&a.title, 50),
            category: a.category.clone(),
            views: a.view_count,
            tags: a.tags.join(", "),
        }
    }
}

pub async fn handle(action: KnowledgeCommands, portal: &Portal) -> Result<()> {
    match action {
        KnowledgeCommands::List { list } => {
            let page = portal.service.list_knowledge_articles(&list.query()).await?;
            portal.format.print_list(&page, || page.items.iter().map(ArticleRow::from).collect())?;
        }
        KnowledgeCommands::Get { id } => {
            let article = portal.service.get_knowledge_article(&id).await?;
            match portal.format {
                OutputFormat::Table => print_article(&article),
                _ => portal.format.print(&article)?,
            }
        }
    }
    Ok(())
}

fn print_article(article: &KnowledgeArticle) {
    println!("{}", article.title.bold());
    let number = article.number.as_deref().unwrap_or(&article.sys_id);
    println!(
        "{}",
        format!("{} | {} / {} | {} | {}", number, article.category, article.subcategory, article.author.name, article.published)
            .dimmed()
    );
    println!();
    println!("{}", article.body);
    if !article.tags.is_empty() {
        println!();
        println!("Tags: {}", article.tags.join(", "));
    }
}
