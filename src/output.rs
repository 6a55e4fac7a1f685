//! Rendering command results as tables, JSON or YAML.

use clap::ValueEnum;
use color_eyre::Result;
use serde::Serialize;

use crate::clickup::{Folder, Space, Task, TaskList, User, Workspace};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Table,
  Json,
  Yaml,
}

/// A record that can be shown as a table row.
pub trait Tabular {
  fn headers() -> &'static [&'static str];
  fn row(&self) -> Vec<String>;
}

/// Render `items` in the requested format.
pub fn render<T: Tabular + Serialize>(items: &[T], format: OutputFormat) -> Result<String> {
  Ok(match format {
    OutputFormat::Table => table(T::headers(), items.iter().map(Tabular::row)),
    OutputFormat::Json => serde_json::to_string_pretty(items)? + "\n",
    OutputFormat::Yaml => serde_yaml::to_string(items)?,
  })
}

/// Plain-text table with columns padded to their widest cell.
pub fn table(headers: &[&str], rows: impl IntoIterator<Item = Vec<String>>) -> String {
  let rows: Vec<Vec<String>> = rows.into_iter().collect();
  let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
  for row in &rows {
    for (i, cell) in row.iter().enumerate() {
      if let Some(width) = widths.get_mut(i) {
        *width = (*width).max(cell.chars().count());
      }
    }
  }

  let header: Vec<String> = headers.iter().map(|h| h.to_uppercase()).collect();
  let mut out = String::new();
  for row in std::iter::once(&header).chain(rows.iter()) {
    let line = row
      .iter()
      .zip(&widths)
      .map(|(cell, width)| format!("{:<width$}", cell, width = width))
      .collect::<Vec<_>>()
      .join("  ");
    out.push_str(line.trim_end());
    out.push('\n');
  }
  out
}

fn or_dash(value: Option<impl ToString>) -> String {
  value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

impl Tabular for Workspace {
  fn headers() -> &'static [&'static str] {
    &["id", "name", "members"]
  }

  fn row(&self) -> Vec<String> {
    vec![self.id.clone(), self.name.clone(), self.member_count.to_string()]
  }
}

impl Tabular for Space {
  fn headers() -> &'static [&'static str] {
    &["id", "name", "private"]
  }

  fn row(&self) -> Vec<String> {
    vec![
      self.id.clone(),
      self.name.clone(),
      if self.private { "yes" } else { "no" }.to_string(),
    ]
  }
}

impl Tabular for Folder {
  fn headers() -> &'static [&'static str] {
    &["id", "name", "lists", "tasks"]
  }

  fn row(&self) -> Vec<String> {
    vec![
      self.id.clone(),
      self.name.clone(),
      self.list_count.to_string(),
      or_dash(self.task_count),
    ]
  }
}

impl Tabular for TaskList {
  fn headers() -> &'static [&'static str] {
    &["id", "name", "tasks"]
  }

  fn row(&self) -> Vec<String> {
    vec![self.id.clone(), self.name.clone(), or_dash(self.task_count)]
  }
}

impl Tabular for Task {
  fn headers() -> &'static [&'static str] {
    &["id", "name", "status", "priority", "assignees", "due"]
  }

  fn row(&self) -> Vec<String> {
    vec![
      self.id.clone(),
      self.name.clone(),
      self.status.clone(),
      or_dash(self.priority.as_deref()),
      if self.assignees.is_empty() {
        "-".to_string()
      } else {
        self.assignees.join(", ")
      },
      or_dash(self.due_date.map(|d| d.format("%Y-%m-%d"))),
    ]
  }
}

impl Tabular for User {
  fn headers() -> &'static [&'static str] {
    &["id", "username", "email"]
  }

  fn row(&self) -> Vec<String> {
    vec![self.id.to_string(), self.username.clone(), or_dash(self.email.as_deref())]
  }
}
