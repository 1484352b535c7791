//! Fixed-size pagination of item lists into titled pages.

/// One rendered chunk of a longer list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    pub title: String,
    /// 1-based position.
    pub index: usize,
    pub total_pages: usize,
    pub body: String,
}

impl Page {
    /// A standalone page that is not part of a numbered sequence.
    pub fn single(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            index: 1,
            total_pages: 1,
            body: body.into(),
        }
    }

    /// Plain-text form used by text-only messengers.
    pub fn render(&self) -> String {
        format!("**{}**\n{}", self.title, self.body)
    }
}

/// How a page body is assembled from rendered items.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageLayout {
    pub separator: String,
    /// Must contain one `%s` slot for the joined items.
    pub template: String,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            separator: "\n".to_string(),
            template: "%s".to_string(),
        }
    }
}

impl PageLayout {
    /// Wrap each page in a code fence.
    pub fn code_block() -> Self {
        Self {
            template: "```%s```".to_string(),
            ..Self::default()
        }
    }

    fn apply(&self, joined: &str) -> String {
        self.template.replacen("%s", joined, 1)
    }
}

/// Split `items` into consecutive groups of at most `n`.
///
/// # Panics
///
/// Panics if `n` is zero.
pub fn group_list<T: Clone>(items: &[T], n: usize) -> Vec<Vec<T>> {
    assert!(n > 0, "group size must be positive");
    items.chunks(n).map(|c| c.to_vec()).collect()
}

/// Render `items` into pages of at most `page_size` entries.
///
/// Empty input yields no pages.
///
/// # Panics
///
/// Panics if `page_size` is zero.
pub fn paginate<T>(
    items: &[T],
    page_size: usize,
    title: &str,
    render_item: impl Fn(&T) -> String,
    layout: &PageLayout,
) -> Vec<Page> {
    assert!(page_size > 0, "page size must be positive");

    let rendered: Vec<String> = items.iter().map(render_item).collect();
    let total_pages = rendered.len().div_ceil(page_size);

    rendered
        .chunks(page_size)
        .enumerate()
        .map(|(i, group)| Page {
            title: format!("{title} - {}/{total_pages}", i + 1),
            index: i + 1,
            total_pages,
            body: layout.apply(&group.join(&layout.separator)),
        })
        .collect()
}

/// `"{i} - {item}"` for every item, counting from zero.
pub fn numbered<T: std::fmt::Display>(items: &[T]) -> Vec<String> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{i} - {item}"))
        .collect()
}
