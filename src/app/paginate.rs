use std::num::IntErrorKind;
use std::ops::Range;

/// Splits `count` items into pages of `per_page`. An empty collection still has one
/// (empty) page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    count: usize,
    per_page: usize,
}

impl Paginator {
    pub fn new(count: usize, per_page: usize) -> Self {
        Self {
            count,
            per_page: per_page.max(1),
        }
    }

    pub fn num_pages(&self) -> usize {
        self.count.div_ceil(self.per_page).max(1)
    }

    /// Turns a raw `?page=` value into a page number. Anything that is not a number
    /// means the first page, numbers out of range mean the last page, including numbers
    /// too long for an integer.
    pub fn resolve(&self, token: Option<&str>) -> usize {
        match token.map(str::trim).map(str::parse::<i64>) {
            Some(Ok(n)) if n >= 1 && (n as u64) <= self.num_pages() as u64 => n as usize,
            Some(Ok(_)) => self.num_pages(),
            Some(Err(e))
                if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) =>
            {
                self.num_pages()
            }
            Some(Err(_)) | None => 1,
        }
    }

    /// Item indices covered by a resolved page number.
    pub fn bounds(&self, number: usize) -> Range<usize> {
        let start = (number.max(1) - 1) * self.per_page;
        let end = (start + self.per_page).min(self.count);
        start.min(end)..end
    }

    pub fn page<T>(&self, number: usize, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number,
            num_pages: self.num_pages(),
            count: self.count,
        }
    }

    /// Pages an in-memory sequence.
    pub fn paginate<T>(items: Vec<T>, token: Option<&str>, per_page: usize) -> Page<T> {
        let paginator = Self::new(items.len(), per_page);
        let number = paginator.resolve(token);
        let range = paginator.bounds(number);
        let items = items
            .into_iter()
            .skip(range.start)
            .take(range.len())
            .collect();
        paginator.page(number, items)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based.
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn previous_page_number(&self) -> usize {
        self.number.saturating_sub(1).max(1)
    }

    pub fn next_page_number(&self) -> usize {
        (self.number + 1).min(self.num_pages)
    }

    pub fn is_paginated(&self) -> bool {
        self.num_pages > 1
    }
}
