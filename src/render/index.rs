use super::PageLinks;
use crate::models::{MonthPlan, YearMonth};
use std::fmt::Write;

const INDEX_HEADER: &str = "> Calendar\n";

/// Navigation page with one link per rendered month.
#[derive(Debug, Clone)]
pub struct IndexPage {
    contents: String,
    months: usize,
}

impl IndexPage {
    pub fn new() -> Self {
        Self {
            contents: INDEX_HEADER.to_string(),
            months: 0,
        }
    }

    pub fn append_month_link(&mut self, month: YearMonth, links: &PageLinks) {
        let _ = writeln!(self.contents, "`F00a`_`[{month}`:{}]`_`f", links.month(month));
        self.months += 1;
    }

    pub fn month_count(&self) -> usize {
        self.months
    }

    pub fn as_str(&self) -> &str {
        &self.contents
    }

    pub fn into_string(self) -> String {
        self.contents
    }
}

impl Default for IndexPage {
    fn default() -> Self {
        Self::new()
    }
}

/// Index linking every month of `plan`, in plan order.
pub fn render_index(plan: &MonthPlan, links: &PageLinks) -> String {
    let mut index = IndexPage::new();
    for month in plan {
        index.append_month_link(*month, links);
    }
    index.into_string()
}
