use serde::Serialize;

/// Posts shown per feed page.
pub const POSTS_PER_PAGE: i64 = 10;

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    total: i64,
    per_page: i64,
}

/// The resolved slice of a result set for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: i64,
    pub num_pages: i64,
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: i64,
    pub num_pages: i64,
    pub total_count: i64,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page_number: Option<i64>,
    pub next_page_number: Option<i64>,
}

impl Paginator {
    pub fn new(total: i64, per_page: i64) -> Self {
        Self {
            total: total.max(0),
            per_page: per_page.max(1),
        }
    }

    /// Always at least one page, so an empty result still renders page 1.
    pub fn num_pages(&self) -> i64 {
        if self.total == 0 {
            1
        } else {
            (self.total + self.per_page - 1) / self.per_page
        }
    }

    /// Maps a raw `?page=` value onto a valid page number. Missing or
    /// non-numeric values give the first page; out-of-range values clamp to
    /// the nearest end.
    pub fn resolve(&self, requested: Option<&str>) -> i64 {
        let parsed = requested.and_then(|raw| raw.trim().parse::<i64>().ok());
        match parsed {
            Some(number) => number.clamp(1, self.num_pages()),
            None => 1,
        }
    }

    pub fn window(&self, requested: Option<&str>) -> PageWindow {
        let number = self.resolve(requested);
        PageWindow {
            number,
            num_pages: self.num_pages(),
            total: self.total,
            offset: (number - 1) * self.per_page,
            limit: self.per_page,
        }
    }
}

impl PageWindow {
    pub fn into_page<T>(self, items: Vec<T>) -> Page<T> {
        let has_previous = self.number > 1;
        let has_next = self.number < self.num_pages;
        Page {
            items,
            number: self.number,
            num_pages: self.num_pages,
            total_count: self.total,
            has_previous,
            has_next,
            previous_page_number: has_previous.then(|| self.number - 1),
            next_page_number: has_next.then(|| self.number + 1),
        }
    }
}

/// Slices an already ordered, in-memory sequence.
pub fn paginate<T>(items: Vec<T>, per_page: i64, requested: Option<&str>) -> Page<T> {
    let window = Paginator::new(items.len() as i64, per_page).window(requested);
    let slice = items
        .into_iter()
        .skip(window.offset as usize)
        .take(window.limit as usize)
        .collect();
    window.into_page(slice)
}
