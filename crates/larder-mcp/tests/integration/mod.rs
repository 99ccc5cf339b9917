mod breaker;
mod concurrency;
mod scenarios;
