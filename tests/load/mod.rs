mod concurrent_search;
