const STOP_WORDS: &[&str] = &[
	"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
];

/// Lowercase and collapse every whitespace run to a single space.
pub fn normalize(text: &str) -> String {
	text.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>().join(" ")
}

/// Distinct lowercase search terms of `text`, in first-seen order, without stop words.
/// Terms split on anything other than alphanumerics, `#` and `+` so `C#` survives.
pub fn terms(text: &str) -> Vec<String> {
	let mut out: Vec<String> = Vec::new();
	for raw in text.split(|c: char| !(c.is_alphanumeric() || c == '#' || c == '+')) {
		if raw.is_empty() { continue; }
		let term = raw.to_lowercase();
		if STOP_WORDS.contains(&term.as_str()) || out.contains(&term) { continue; }
		out.push(term);
	}
	out
}

/// Non-overlapping occurrences of `needle` in `haystack`; zero for an empty needle.
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
	if needle.is_empty() { return 0; }
	haystack.matches(needle).count()
}
