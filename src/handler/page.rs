//! Upload page module
//!
//! Serves the browser upload UI: a multi-file picker with per-file progress
//! bars. Each selected file is POSTed to `/upload?filename=<name>` as a raw
//! octet stream.

/// Get the upload page HTML
pub fn get_upload_page() -> String {
    String::from(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>File Upload</title>
    <style>
        * {
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }
        body {
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, "Helvetica Neue", Arial, sans-serif;
            line-height: 1.6;
            background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
            color: white;
        }
        .container {
            padding: 40px;
            background: rgba(255, 255, 255, 0.1);
            border-radius: 20px;
            backdrop-filter: blur(10px);
            box-shadow: 0 8px 32px 0 rgba(31, 38, 135, 0.37);
            border: 1px solid rgba(255, 255, 255, 0.18);
            width: 90%;
            max-width: 600px;
        }
        h1 {
            font-size: 2em;
            margin-bottom: 20px;
            font-weight: 700;
        }
        input[type="file"] {
            margin-bottom: 20px;
        }
        .progress-bar {
            width: 100%;
            background: rgba(255, 255, 255, 0.2);
            border-radius: 5px;
            margin: 4px 0 12px;
            overflow: hidden;
        }
        .progress-bar div {
            width: 0%;
            height: 20px;
            background: #2196F3;
            text-align: center;
            line-height: 20px;
            font-size: 0.8em;
            color: white;
            transition: width 0.1s;
        }
        .completed {
            background: #4ade80 !important;
        }
        .failed {
            background: #ef4444 !important;
        }
    </style>
</head>
<body>
    <div class="container">
        <h1>Upload Files</h1>
        <input type="file" id="fileInput" multiple>
        <div id="progressContainer"></div>
    </div>
    <script>
        document.getElementById('fileInput').addEventListener('change', function() {
            for (var i = 0; i < this.files.length; i++) {
                uploadFile(this.files[i]);
            }
        });

        function uploadFile(file) {
            var container = document.getElementById('progressContainer');

            var label = document.createElement('div');
            label.textContent = file.name;
            container.appendChild(label);

            var bar = document.createElement('div');
            bar.className = 'progress-bar';
            var fill = document.createElement('div');
            bar.appendChild(fill);
            container.appendChild(bar);

            var xhr = new XMLHttpRequest();
            xhr.open('POST', '/upload?filename=' + encodeURIComponent(file.name), true);
            xhr.setRequestHeader('Content-Type', 'application/octet-stream');

            xhr.upload.onprogress = function(event) {
                if (event.lengthComputable) {
                    var percent = (event.loaded / event.total) * 100;
                    fill.style.width = percent + '%';
                    fill.textContent = percent.toFixed(2) + '%';
                }
            };

            xhr.onload = function() {
                if (xhr.status === 200) {
                    fill.classList.add('completed');
                    fill.style.width = '100%';
                    fill.textContent = 'Completed';
                } else {
                    fill.classList.add('failed');
                    fill.style.width = '100%';
                    fill.textContent = 'Failed';
                }
            };

            xhr.onerror = function() {
                fill.classList.add('failed');
                fill.style.width = '100%';
                fill.textContent = 'Failed';
            };

            xhr.send(file);
        }
    </script>
</body>
</html>"#,
    )
}
