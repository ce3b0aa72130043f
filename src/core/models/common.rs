pub struct Pagination {
    pub page: i64,
    pub size: i64,
}

impl Pagination {
    pub fn new(page: i64, size: i64) -> Self {
        Self { page, size }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.size
    }
}
