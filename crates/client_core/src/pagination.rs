/// Page size the HRMS backend uses for its paginated collections.
pub const DEFAULT_PAGE_SIZE: u32 = 5;

/// ceil(count / page_size), never less than one page.
pub fn total_pages_for(count: u64, page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    let pages = count.div_ceil(page_size).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationController {
    current_page: u32,
    total_pages: u32,
    page_size: u32,
}

impl Default for PaginationController {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl PaginationController {
    pub fn new(page_size: u32) -> Self {
        Self {
            current_page: 1,
            total_pages: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn contains(&self, page: u32) -> bool {
        (1..=self.total_pages).contains(&page)
    }

    /// Moves to `page` and returns true when a fetch is needed.
    /// Pages outside `1..=total_pages` are ignored.
    pub fn go_to(&mut self, page: u32) -> bool {
        if !self.contains(page) {
            return false;
        }
        self.current_page = page;
        true
    }

    /// Records a page that actually loaded, with the count it reported.
    /// Returns true when `page` lies past the new last page and was pulled back.
    pub fn settle(&mut self, page: u32, count: u64) -> bool {
        self.current_page = page.max(1);
        self.set_total_count(count)
    }

    /// Returns true when the current page had to be pulled back inside the range.
    pub fn set_total_pages(&mut self, total_pages: u32) -> bool {
        self.total_pages = total_pages.max(1);
        if self.current_page > self.total_pages {
            self.current_page = self.total_pages;
            return true;
        }
        false
    }

    pub fn set_total_count(&mut self, count: u64) -> bool {
        self.set_total_pages(total_pages_for(count, self.page_size))
    }

    pub fn reset(&mut self) {
        self.current_page = 1;
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    pub fn first(&mut self) -> bool {
        self.go_to(1)
    }

    pub fn previous(&mut self) -> bool {
        self.has_previous() && self.go_to(self.current_page - 1)
    }

    pub fn next(&mut self) -> bool {
        self.has_next() && self.go_to(self.current_page + 1)
    }

    pub fn last(&mut self) -> bool {
        self.go_to(self.total_pages)
    }

    pub fn label(&self) -> String {
        format!("Page {} of {}", self.current_page, self.total_pages)
    }
}

#[cfg(test)]
#[path = "tests/pagination_tests.rs"]
mod tests;
